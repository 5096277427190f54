// error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::access::AccessError;
use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::transform::TransformError;

/// Failure while writing an encoded file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("refusing to replace the source file {0} with its own output")]
    WouldOverwriteSource(PathBuf),
}

impl IoError {
    pub(crate) fn write_failed(path: &std::path::Path, err: std::io::Error) -> Self {
        IoError::WriteFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Everything that can end a single conversion job.
///
/// Errors are recorded on the job that produced them; they never abort
/// the rest of the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("access denied: {0}")]
    AccessDenied(#[from] AccessError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("{0}")]
    Io(#[from] IoError),

    #[error("conversion cancelled")]
    Cancelled,
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("quality {0} is outside 0..=100")]
    QualityOutOfRange(f32),

    #[error("resize target {width}x{height} must be non-zero")]
    InvalidResize { width: u32, height: u32 },

    #[error("output directory {0} does not exist")]
    MissingOutputDirectory(PathBuf),
}
