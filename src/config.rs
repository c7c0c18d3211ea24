//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::export::SerializationFormat;
use crate::origin;
use crate::preprocessing::{ImputeStrategy, UnknownCategoryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`PipelineConfig::artifact_dir`]
pub const ENV_ARTIFACT_DIR: &str = "CARPRICE_ARTIFACT_DIR";
/// Environment variable overriding [`PipelineConfig::format`] (`binary` or `json`)
pub const ENV_FORMAT: &str = "CARPRICE_FORMAT";

/// Configuration shared by training and inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the `preprocessor` and `model` artifacts
    pub artifact_dir: PathBuf,

    /// File name of the fitted feature encoder inside `artifact_dir`
    pub preprocessor_file: String,

    /// File name of the fitted regressor inside `artifact_dir`
    pub model_file: String,

    /// On-disk encoding of artifacts
    pub format: SerializationFormat,

    /// Statistic used to fill missing numerical cells
    pub numeric_impute: ImputeStrategy,

    /// What the categorical encoder does with values it never saw at fit time
    pub unknown_category: UnknownCategoryPolicy,

    /// L2 penalty of the ridge regressor fitted after encoding
    pub ridge_alpha: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            preprocessor_file: "preprocessor.bin".to_string(),
            model_file: "model.bin".to_string(),
            format: SerializationFormat::Binary,
            numeric_impute: ImputeStrategy::Median,
            unknown_category: UnknownCategoryPolicy::UnknownBucket,
            ridge_alpha: 1.0,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the artifact directory
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Builder method to set the serialization format
    pub fn with_format(mut self, format: SerializationFormat) -> Self {
        self.format = format;
        self
    }

    /// Builder method to set numeric impute strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute = strategy;
        self
    }

    /// Builder method to set the unknown-category policy
    pub fn with_unknown_category(mut self, policy: UnknownCategoryPolicy) -> Self {
        self.unknown_category = policy;
        self
    }

    /// Builder method to set the ridge penalty
    pub fn with_ridge_alpha(mut self, alpha: f64) -> Self {
        self.ridge_alpha = alpha;
        self
    }

    /// Load a JSON configuration file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(origin!("config.from_file"), path, e))?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            PipelineError::config(origin!("config.from_file"), format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `CARPRICE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    /// Apply `CARPRICE_*` environment overrides on top of this configuration.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Ok(dir) = std::env::var(ENV_ARTIFACT_DIR) {
            if !dir.trim().is_empty() {
                self.artifact_dir = PathBuf::from(dir);
            }
        }
        if let Ok(format) = std::env::var(ENV_FORMAT) {
            self.format = format.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.preprocessor_file.is_empty() || self.model_file.is_empty() {
            return Err(PipelineError::config(
                origin!("config.validate"),
                "artifact file names must not be empty",
            ));
        }
        if self.preprocessor_file == self.model_file {
            return Err(PipelineError::config(
                origin!("config.validate"),
                format!("preprocessor and model share the file name `{}`", self.model_file),
            ));
        }
        if !self.ridge_alpha.is_finite() || self.ridge_alpha < 0.0 {
            return Err(PipelineError::config(
                origin!("config.validate"),
                format!("ridge_alpha must be a non-negative number, got {}", self.ridge_alpha),
            ));
        }
        Ok(())
    }
}
