//! carprice - car price feature pipeline
//!
//! Declares which columns are numerical and categorical, fits a reproducible
//! encoding on a training table, persists it, and applies exactly the same
//! transformation to new records at prediction time.
//!
//! # Modules
//!
//! - [`schema`] - numerical / categorical / target column declaration
//! - [`preprocessing`] - column normalizer and the feature encoders
//! - [`export`] - artifact store (keyed, atomic, checksummed)
//! - [`training`] - training orchestrator and ridge regressor
//! - [`inference`] - lazily-loading prediction service
//! - [`utils`] - table loading
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```no_run
//! use carprice::prelude::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default().with_artifact_dir("artifacts");
//! TrainingOrchestrator::car_price(config.clone()).train_and_save("train.csv", "test.csv")?;
//!
//! // one submitted form, every feature present
//! let form: CarFeatures = serde_json::from_reader(std::fs::File::open("car.json")?)?;
//! let service = PredictionService::from_config(&config);
//! let price = service.predict(&RawRecord::from(form))?;
//! println!("estimated price: {:.0}", price);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod schema;

pub mod preprocessing;
pub mod export;
pub mod training;
pub mod inference;
pub mod utils;

pub mod cli;

pub use error::{ErrorKind, PipelineError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{ErrorKind, PipelineError, Result, ResultExt};
    pub use crate::export::{ArtifactMetadata, ArtifactStore, SerializationFormat, MODEL_KEY, PREPROCESSOR_KEY};
    pub use crate::inference::{CarFeatures, PredictionService, RawRecord, RawValue};
    pub use crate::preprocessing::{
        normalize_columns, normalize_strings, FeatureEncoder, FeatureMatrix, ImputeStrategy,
        UnknownCategoryPolicy,
    };
    pub use crate::schema::Schema;
    pub use crate::training::{RegressionModel, Regressor, TrainingOrchestrator};
}
