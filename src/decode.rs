// decode.rs
use image::io::Reader as ImageReader;
use image::{ImageError, ImageFormat};
use std::io::{BufRead, Cursor, ErrorKind, Seek};
use std::path::Path;
use thiserror::Error;

use crate::raster::RasterImage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("source file not found")]
    NotFound,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt image data: {0}")]
    CorruptData(String),

    #[error("could not read source: {0}")]
    Unreadable(String),
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => DecodeError::NotFound,
            ErrorKind::UnexpectedEof | ErrorKind::InvalidData => {
                DecodeError::CorruptData(err.to_string())
            }
            _ => DecodeError::Unreadable(err.to_string()),
        }
    }
}

impl From<ImageError> for DecodeError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::IoError(io) => io.into(),
            ImageError::Unsupported(e) => DecodeError::UnsupportedFormat(e.to_string()),
            other => DecodeError::CorruptData(other.to_string()),
        }
    }
}

/// Reads a PNG file into a fully materialised RGBA8 buffer.
pub fn decode(path: &Path) -> Result<RasterImage, DecodeError> {
    // the extension sets the initial guess, magic bytes override it
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    decode_reader(reader)
}

/// Same as [`decode`] for an in-memory PNG.
pub fn decode_bytes(bytes: &[u8]) -> Result<RasterImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    decode_reader(reader)
}

fn decode_reader<R: BufRead + Seek>(reader: ImageReader<R>) -> Result<RasterImage, DecodeError> {
    match reader.format() {
        Some(ImageFormat::Png) => {}
        Some(other) => return Err(DecodeError::UnsupportedFormat(format!("{:?}", other))),
        None => {
            return Err(DecodeError::UnsupportedFormat(
                "unrecognised image signature".to_string(),
            ))
        }
    }

    let rgba = reader.decode()?.into_rgba8();
    let (width, height) = rgba.dimensions();
    RasterImage::from_rgba(width, height, rgba.into_raw())
        .map_err(|e| DecodeError::CorruptData(e.to_string()))
}
