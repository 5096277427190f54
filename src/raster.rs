// raster.rs
//! In-memory RGBA8 pixel buffers passed between pipeline stages.

use std::borrow::Cow;
use thiserror::Error;

pub const BYTES_PER_PIXEL: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    #[error("stride {stride} is smaller than {width} pixels of RGBA8")]
    StrideTooSmall { width: u32, stride: u32 },

    #[error("pixel buffer holds {actual} bytes, expected at least {expected}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("dimensions {width}x{height} overflow the address space")]
    Overflow { width: u32, height: u32 },
}

/// A fully decoded RGBA8 image, top-left origin, row-major.
///
/// `stride` is the distance in bytes between the starts of two rows and
/// is never smaller than `width * 4`. The buffer is always at least
/// `stride * height` bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    stride: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, stride: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        let min_stride = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or(RasterError::Overflow { width, height })?;
        if stride < min_stride {
            return Err(RasterError::StrideTooSmall { width, stride });
        }
        let expected = (stride as usize)
            .checked_mul(height as usize)
            .ok_or(RasterError::Overflow { width, height })?;
        if pixels.len() < expected {
            return Err(RasterError::BufferTooSmall {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            pixels,
        })
    }

    /// Wraps a tightly packed RGBA8 buffer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        let stride = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or(RasterError::Overflow { width, height })?;
        Self::new(width, height, stride, pixels)
    }

    /// An image where every pixel has the same RGBA value.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, RasterError> {
        let overflow = RasterError::Overflow { width, height };
        let stride = width.checked_mul(BYTES_PER_PIXEL).ok_or(overflow.clone())?;
        let len = (stride as usize)
            .checked_mul(height as usize)
            .ok_or(overflow)?;
        let pixels = rgba.iter().copied().cycle().take(len).collect();
        Self::from_rgba(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Visible bytes of row `y`, without stride padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride as usize;
        self.pixels.get(start..start + self.row_len())
    }

    pub fn is_packed(&self) -> bool {
        self.stride as usize == self.row_len()
    }

    /// Pixel data with any row padding removed.
    pub fn packed_pixels(&self) -> Cow<'_, [u8]> {
        let len = self.row_len() * self.height as usize;
        if self.is_packed() {
            return Cow::Borrowed(&self.pixels[..len]);
        }
        let mut packed = Vec::with_capacity(len);
        for row in (0..self.height).filter_map(|y| self.row(y)) {
            packed.extend_from_slice(row);
        }
        Cow::Owned(packed)
    }

    fn row_len(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_stride() {
        let err = RasterImage::new(4, 1, 15, vec![0; 16]).unwrap_err();
        assert_eq!(err, RasterError::StrideTooSmall { width: 4, stride: 15 });
    }

    #[test]
    fn rejects_short_buffer() {
        let err = RasterImage::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            RasterError::BufferTooSmall {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn packs_padded_rows() {
        // 1x2 image with 4 bytes of padding after each row
        let pixels = vec![1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];
        let img = RasterImage::new(1, 2, 8, pixels).unwrap();
        assert!(!img.is_packed());
        assert_eq!(img.row(1), Some(&[5, 6, 7, 8][..]));
        assert_eq!(&*img.packed_pixels(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn solid_fills_every_pixel() {
        let img = RasterImage::solid(3, 2, [255, 0, 0, 255]).unwrap();
        assert_eq!(img.pixels().len(), 24);
        assert!(img.pixels().chunks(4).all(|px| px == [255, 0, 0, 255]));
        assert!(matches!(img.packed_pixels(), Cow::Borrowed(_)));
    }

    #[test]
    fn row_past_the_end_is_none() {
        let img = RasterImage::solid(2, 3, [1, 1, 1, 1]).unwrap();
        assert_eq!(img.row(2).map(<[u8]>::len), Some(8));
        assert_eq!(img.row(3), None);
        assert_eq!(img.row(u32::MAX), None);
    }

    #[test]
    fn solid_rejects_overflowing_width() {
        let err = RasterImage::solid(u32::MAX, 1, [0; 4]).unwrap_err();
        assert_eq!(err, RasterError::Overflow { width: u32::MAX, height: 1 });
    }
}
