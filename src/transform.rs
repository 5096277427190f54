// transform.rs
//! Pixel transforms applied between decode and encode.
//!
//! The batch pipeline holds a single `Box<dyn PixelTransform>`. New stages
//! (filters, color correction, a hardware-backed path) implement the trait
//! and slot in without touching the decoder or encoder.

use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;

use crate::raster::RasterImage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("invalid target size {width}x{height}")]
    InvalidTarget { width: u32, height: u32 },

    #[error("{0}")]
    Failed(String),
}

pub trait PixelTransform: Send + Sync {
    fn name(&self) -> &str;

    fn transform(&self, image: RasterImage) -> Result<RasterImage, TransformError>;
}

/// Passes the image through untouched: same dimensions, same stride,
/// byte-for-byte identical pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl PixelTransform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn transform(&self, image: RasterImage) -> Result<RasterImage, TransformError> {
        Ok(image)
    }
}

/// Resizes to exact dimensions, ignoring aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Resize {
    pub fn new(width: u32, height: u32, filter: FilterType) -> Self {
        Self {
            width,
            height,
            filter,
        }
    }
}

impl PixelTransform for Resize {
    fn name(&self) -> &str {
        "resize"
    }

    fn transform(&self, image: RasterImage) -> Result<RasterImage, TransformError> {
        if self.width == 0 || self.height == 0 {
            return Err(TransformError::InvalidTarget {
                width: self.width,
                height: self.height,
            });
        }
        if image.width() == self.width && image.height() == self.height {
            return Ok(image);
        }

        let (width, height) = (image.width(), image.height());
        let source = RgbaImage::from_raw(width, height, image.packed_pixels().into_owned())
            .ok_or_else(|| TransformError::Failed(format!("cannot view {}x{} buffer", width, height)))?;
        let resized = image::imageops::resize(&source, self.width, self.height, self.filter);

        RasterImage::from_rgba(self.width, self.height, resized.into_raw())
            .map_err(|e| TransformError::Failed(e.to_string()))
    }
}
