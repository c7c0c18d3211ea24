//! Artifact persistence
//!
//! Fitted encoders and regressors are saved under a logical key
//! (`preprocessor`, `model`) and reloaded by independent processes.

mod serializer;

pub use serializer::{ArtifactMetadata, ArtifactStore, SerializationFormat, MODEL_KEY, PREPROCESSOR_KEY};
