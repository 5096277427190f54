// lib.rs
//! PNG to WebP batch conversion.
//!
//! Each file goes through the same pipeline: acquire a file-access grant,
//! decode to RGBA8, apply a [`PixelTransform`] (identity unless configured
//! otherwise), encode with libwebp and write the result next to the source.
//! [`BatchCoordinator`] runs the pipeline over many files and reports
//! progress through a [`ProgressSink`].

pub mod access;
pub mod batch;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod progress;
pub mod raster;
pub mod transform;
pub mod utils;

pub use access::{AccessError, AccessGrant, FileAccessProvider, RootedAccess, ScopedAccess, Unrestricted};
pub use batch::{BatchCoordinator, BatchSnapshot, ConversionJob};
pub use config::{BatchOptions, ConverterConfig, EncodeMode, EncodeSettings};
pub use decode::{decode, decode_bytes, DecodeError};
pub use encode::{encode, EncodeError, EncodedOutput};
pub use error::{ConfigError, ConvertError, IoError};
pub use progress::{ChannelSink, JobEvent, JobId, JobState, NullSink, ProgressSink, ProgressUpdate};
pub use raster::RasterImage;
pub use transform::{Identity, PixelTransform, Resize, TransformError};
