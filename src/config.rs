//! Viewer configuration.
//!
//! Every field has a default, so a JSON file only needs to name the values it
//! overrides.

use crate::enums::{DecodeFailurePolicy, ImageOrigin, Interpolation, SliceFilter};
use crate::volume_loader::LoadOptions;

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parameters handed to the volumetric renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Grid the volume is resampled to, (x, y, z) in volume axis order.
    pub target_shape: (usize, usize, usize),
    pub opacity: f32,
    /// Number of iso-surface levels.
    pub surface_count: u32,
    pub colorscale: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            target_shape: (64, 64, 64),
            opacity: 0.1,
            surface_count: 15,
            colorscale: "Gray".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub slice_filter: SliceFilter,
    pub decode_failure_policy: DecodeFailurePolicy,
    pub interpolation: Interpolation,
    pub image_origin: ImageOrigin,
    pub render: RenderSettings,
    /// Columns of the thumbnail grid.
    pub grid_columns: usize,
    /// Edge length in pixels of one composed thumbnail cell.
    pub thumbnail_size: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            slice_filter: SliceFilter::default(),
            decode_failure_policy: DecodeFailurePolicy::default(),
            interpolation: Interpolation::default(),
            image_origin: ImageOrigin::default(),
            render: RenderSettings::default(),
            grid_columns: 2,
            thumbnail_size: 256,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (x, y, z) = self.render.target_shape;
        if x == 0 || y == 0 || z == 0 {
            return Err(ConfigError::Invalid(format!(
                "render.target_shape must be non-zero, got {:?}",
                self.render.target_shape
            )));
        }
        if !(0.0..=1.0).contains(&self.render.opacity) {
            return Err(ConfigError::Invalid(format!(
                "render.opacity must be within [0, 1], got {}",
                self.render.opacity
            )));
        }
        if self.grid_columns == 0 {
            return Err(ConfigError::Invalid("grid_columns must be at least 1".into()));
        }
        if self.thumbnail_size == 0 {
            return Err(ConfigError::Invalid("thumbnail_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            filter: self.slice_filter,
            policy: self.decode_failure_policy,
        }
    }
}
