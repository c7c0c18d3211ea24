//! Model training
//!
//! The orchestrator fits the feature encoder on the training table, encodes
//! train and test tables with that fit and persists the artifacts. A ridge
//! regressor is fitted on the encoded training matrix.

pub mod linear_models;
mod orchestrator;

pub use linear_models::{r2_score, LinearRegression, RegressionModel, Regressor};
pub use orchestrator::{TrainingOrchestrator, TrainingOutput, TrainingReport};
