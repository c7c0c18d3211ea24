//! Inference
//!
//! [`PredictionService`] turns one raw record (or a raw table) into a price
//! prediction using the persisted `preprocessor` and `model` artifacts.

mod engine;
mod record;

pub use engine::{InferenceStats, LoadedArtifacts, PredictionService};
pub use record::{records_to_dataframe, CarFeatures, RawRecord, RawValue};
