//! Classifier configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// ImageNet per-channel mean, RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet per-channel standard deviation, RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Directory holding the weight sets and their label files.
    pub model_dir: PathBuf,
    /// Name of the model's image input.
    pub input_name: String,
    /// Top-K used when the caller does not ask for a specific K.
    pub top_k: usize,
    /// Number of recent predictions the ledger keeps.
    pub ledger_capacity: usize,
    pub preprocess: PreprocessConfig,
}

/// Resize, crop, and normalization recipe applied to every image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// The shorter image edge is resized to this many pixels.
    pub resize_shorter: u32,
    /// Side of the square center crop; also the model's input height and width.
    pub crop_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            input_name: "input".to_string(),
            top_k: 5,
            ledger_capacity: 50,
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            resize_shorter: 256,
            crop_size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl ClassifierConfig {
    /// Load from a JSON file. Fields missing from the file keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }
        if self.ledger_capacity == 0 {
            return Err(ConfigError::Invalid(
                "ledger_capacity must be at least 1".into(),
            ));
        }
        if self.input_name.is_empty() {
            return Err(ConfigError::Invalid("input_name must not be empty".into()));
        }
        self.preprocess.validate()
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crop_size == 0 {
            return Err(ConfigError::Invalid("crop_size must be at least 1".into()));
        }
        if self.resize_shorter < self.crop_size {
            return Err(ConfigError::Invalid(format!(
                "resize_shorter ({}) must not be smaller than crop_size ({})",
                self.resize_shorter, self.crop_size
            )));
        }
        if let Some(s) = self.std.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "std values must be positive and finite, got {s}"
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(ConfigError::Invalid("mean values must be finite".into()));
        }
        Ok(())
    }

    /// Output tensor shape, `[3, crop, crop]`.
    pub fn tensor_shape(&self) -> [usize; 3] {
        [3, self.crop_size as usize, self.crop_size as usize]
    }
}
