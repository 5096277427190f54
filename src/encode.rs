// encode.rs
use libwebp_sys::{WebPConfig, WebPImageHint};
use thiserror::Error;

use crate::config::{EncodeMode, EncodeSettings};
use crate::raster::RasterImage;

/// Largest width or height a WebP bitstream can carry.
pub const MAX_DIMENSION: u32 = 16383;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("cannot encode a {width}x{height} image")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("compression failed: {0}")]
    CompressionFailure(String),
}

/// A complete WebP file (RIFF container).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOutput {
    bytes: Vec<u8>,
}

impl EncodedOutput {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when the container carries a VP8L (lossless) bitstream.
    pub fn is_lossless(&self) -> bool {
        self.chunk_ids().any(|id| id == b"VP8L")
    }

    fn chunk_ids(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut offset = 12;
        std::iter::from_fn(move || {
            let header = self.bytes.get(offset..offset + 8)?;
            let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
            // chunk payloads are padded to an even length
            offset = offset.saturating_add(8 + size + (size & 1));
            Some(&header[..4])
        })
    }
}

/// Compresses `image` to WebP.
///
/// Quality 100 selects lossless with exact color preservation under
/// transparent pixels. Anything lower is lossy at that quality with sharp
/// YUV conversion and the graphic-content hint.
pub fn encode(image: RasterImage, settings: &EncodeSettings) -> Result<EncodedOutput, EncodeError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let config = webp_config(settings.mode())?;
    let pixels = image.packed_pixels();
    let memory = webp::Encoder::from_rgba(&pixels, width, height)
        .encode_advanced(&config)
        .map_err(|e| EncodeError::CompressionFailure(format!("{:?}", e)))?;

    if memory.is_empty() {
        return Err(EncodeError::CompressionFailure(
            "encoder returned an empty bitstream".to_string(),
        ));
    }

    Ok(EncodedOutput {
        bytes: memory.to_vec(),
    })
}

fn webp_config(mode: EncodeMode) -> Result<WebPConfig, EncodeError> {
    let mut config = WebPConfig::new().map_err(|_| {
        EncodeError::CompressionFailure("libwebp version mismatch in config init".to_string())
    })?;

    match mode {
        EncodeMode::Lossless => {
            config.lossless = 1;
            config.exact = 1;
            config.quality = crate::config::LOSSLESS_QUALITY;
        }
        EncodeMode::Lossy(quality) => {
            config.lossless = 0;
            config.quality = quality;
            config.use_sharp_yuv = 1;
            config.image_hint = WebPImageHint::WEBP_HINT_GRAPH;
        }
    }
    Ok(config)
}
