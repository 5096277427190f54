// config.rs
use image::imageops::FilterType;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::transform::{Identity, PixelTransform, Resize};

/// Quality at or above which the encoder switches to lossless + exact.
pub const LOSSLESS_QUALITY: f32 = 100.0;

pub const DEFAULT_QUALITY: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodeMode {
    Lossless,
    Lossy(f32),
}

/// Validated encoder settings. Construct with [`EncodeSettings::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    quality: f32,
}

impl EncodeSettings {
    pub fn new(quality: f32) -> Result<Self, ConfigError> {
        if !(0.0..=100.0).contains(&quality) {
            return Err(ConfigError::QualityOutOfRange(quality));
        }
        Ok(Self { quality })
    }

    pub fn lossless() -> Self {
        Self {
            quality: LOSSLESS_QUALITY,
        }
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn mode(&self) -> EncodeMode {
        if self.quality >= LOSSLESS_QUALITY {
            EncodeMode::Lossless
        } else {
            EncodeMode::Lossy(self.quality)
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Run independent jobs on a rayon pool instead of one at a time.
    pub parallel: bool,
    /// Worker count for parallel mode; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Write `<stem>.webp` here instead of next to the source.
    pub output_directory: Option<PathBuf>,
}

/// User-facing settings for a conversion batch.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub quality: f32,
    pub resize: Option<(u32, u32)>,
    pub output_directory: Option<PathBuf>,
    pub parallel: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            resize: None,
            output_directory: None,
            parallel: false,
        }
    }
}

impl ConverterConfig {
    pub fn encode_settings(&self) -> Result<EncodeSettings, ConfigError> {
        EncodeSettings::new(self.quality)
    }

    pub fn pixel_transform(&self) -> Result<Box<dyn PixelTransform>, ConfigError> {
        match self.resize {
            None => Ok(Box::new(Identity)),
            Some((width, height)) if width == 0 || height == 0 => {
                Err(ConfigError::InvalidResize { width, height })
            }
            Some((width, height)) => Ok(Box::new(Resize::new(width, height, FilterType::Lanczos3))),
        }
    }

    pub fn batch_options(&self) -> Result<BatchOptions, ConfigError> {
        if let Some(dir) = &self.output_directory {
            if !dir.is_dir() {
                return Err(ConfigError::MissingOutputDirectory(dir.clone()));
            }
        }
        Ok(BatchOptions {
            parallel: self.parallel,
            threads: None,
            output_directory: self.output_directory.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_boundary_is_exactly_100() {
        assert_eq!(EncodeSettings::new(100.0).unwrap().mode(), EncodeMode::Lossless);
        assert_eq!(EncodeSettings::new(99.9).unwrap().mode(), EncodeMode::Lossy(99.9));
        assert_eq!(EncodeSettings::new(0.0).unwrap().mode(), EncodeMode::Lossy(0.0));
    }

    #[test]
    fn rejects_out_of_range_quality() {
        assert_eq!(
            EncodeSettings::new(100.5),
            Err(ConfigError::QualityOutOfRange(100.5))
        );
        assert!(EncodeSettings::new(-1.0).is_err());
        assert!(EncodeSettings::new(f32::NAN).is_err());
    }

    #[test]
    fn rejects_zero_resize() {
        let config = ConverterConfig {
            resize: Some((0, 10)),
            ..Default::default()
        };
        assert!(matches!(
            config.pixel_transform(),
            Err(ConfigError::InvalidResize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn default_transform_is_identity() {
        let transform = ConverterConfig::default().pixel_transform().unwrap();
        assert_eq!(transform.name(), "identity");
    }

    #[test]
    fn rejects_missing_output_directory() {
        let config = ConverterConfig {
            output_directory: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(matches!(
            config.batch_options(),
            Err(ConfigError::MissingOutputDirectory(_))
        ));
    }
}
