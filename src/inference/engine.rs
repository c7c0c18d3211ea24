//! Prediction service
//!
//! Loads the fitted feature encoder and regressor lazily on first use and
//! caches them for the lifetime of the service. The load is guarded by a
//! `parking_lot::RwLock`: at most one load runs, concurrent callers wait for
//! it, and nobody observes a half-assigned encoder/regressor pair. A failed
//! load leaves the service unloaded so a later call can retry.

use parking_lot::RwLock;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::record::RawRecord;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::export::{ArtifactMetadata, ArtifactStore, MODEL_KEY, PREPROCESSOR_KEY};
use crate::origin;
use crate::preprocessing::{normalize_columns, normalize_strings, FeatureEncoder};
use crate::training::{RegressionModel, Regressor};

/// Encoder and regressor loaded together
#[derive(Debug)]
pub struct LoadedArtifacts {
    encoder: FeatureEncoder,
    model: RegressionModel,
    model_metadata: Option<ArtifactMetadata>,
}

impl LoadedArtifacts {
    /// Pair a fitted encoder with a fitted regressor, checking they agree on
    /// the feature count.
    pub fn new(encoder: FeatureEncoder, model: RegressionModel) -> Result<Self> {
        if !encoder.is_fitted() {
            return Err(PipelineError::not_fitted(origin!("artifacts.new"), "FeatureEncoder"));
        }
        let expected = model
            .n_features()
            .ok_or_else(|| PipelineError::not_fitted(origin!("artifacts.new"), "RegressionModel"))?;
        if expected != encoder.n_features() {
            return Err(PipelineError::upstream(
                origin!("artifacts.new"),
                format!(
                    "regressor expects {} features but the encoder produces {}",
                    expected,
                    encoder.n_features()
                ),
            ));
        }
        Ok(Self {
            encoder,
            model,
            model_metadata: None,
        })
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn model(&self) -> &RegressionModel {
        &self.model
    }

    /// Metadata of the `model` artifact, when loaded from a store
    pub fn model_metadata(&self) -> Option<&ArtifactMetadata> {
        self.model_metadata.as_ref()
    }
}

/// Inference statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub error_count: u64,
    /// Successful artifact loads
    pub loads: u64,
    pub avg_latency_ms: f64,
    pub is_loaded: bool,
}

#[derive(Debug, Default)]
struct Counters {
    predictions: AtomicU64,
    errors: AtomicU64,
    loads: AtomicU64,
    calls: AtomicU64,
    latency_ns: AtomicU64,
}

/// Lazily-loading prediction service over an [`ArtifactStore`]
#[derive(Debug)]
pub struct PredictionService {
    store: ArtifactStore,
    artifacts: RwLock<Option<Arc<LoadedArtifacts>>>,
    counters: Counters,
}

impl PredictionService {
    /// Unloaded service reading from `store`
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            artifacts: RwLock::new(None),
            counters: Counters::default(),
        }
    }

    /// Unloaded service reading from the configured artifact directory
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(ArtifactStore::from_config(config))
    }

    /// Service that starts out loaded with the given artifacts
    pub fn with_artifacts(store: ArtifactStore, artifacts: LoadedArtifacts) -> Self {
        Self {
            store,
            artifacts: RwLock::new(Some(Arc::new(artifacts))),
            counters: Counters::default(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.artifacts.read().is_some()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Loaded artifacts, loading them on first use.
    pub fn artifacts(&self) -> Result<Arc<LoadedArtifacts>> {
        if let Some(loaded) = self.artifacts.read().as_ref() {
            return Ok(Arc::clone(loaded));
        }

        let mut slot = self.artifacts.write();
        // another caller may have finished loading while we waited
        if let Some(loaded) = slot.as_ref() {
            return Ok(Arc::clone(loaded));
        }

        let loaded = Arc::new(self.load_from_store()?);
        *slot = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Replace the cached artifacts with a fresh load from the store. On
    /// failure the previous artifacts stay in place.
    pub fn reload(&self) -> Result<()> {
        let loaded = Arc::new(self.load_from_store()?);
        *self.artifacts.write() = Some(loaded);
        Ok(())
    }

    fn load_from_store(&self) -> Result<LoadedArtifacts> {
        let start = Instant::now();
        let encoder: FeatureEncoder = self
            .store
            .load(PREPROCESSOR_KEY)
            .context("prediction.load", "loading preprocessor")?;
        let (model, metadata): (RegressionModel, _) = self
            .store
            .load_with_metadata(MODEL_KEY)
            .context("prediction.load", "loading model")?;

        let encoder_features = encoder.feature_names();
        if metadata.feature_names != encoder_features {
            let first_difference = metadata
                .feature_names
                .iter()
                .zip(&encoder_features)
                .find(|(m, e)| m != e)
                .map(|(m, e)| format!("`{}` vs `{}`", m, e))
                .unwrap_or_else(|| {
                    format!("{} vs {} names", metadata.feature_names.len(), encoder_features.len())
                });
            return Err(PipelineError::artifact_corrupt(
                origin!("prediction.load"),
                MODEL_KEY,
                self.store.path_for(MODEL_KEY),
                format!(
                    "`{}` was fitted on different features than `{}` ({})",
                    MODEL_KEY, PREPROCESSOR_KEY, first_difference
                ),
            ));
        }

        let mut loaded = LoadedArtifacts::new(encoder, model).context("prediction.load", "pairing artifacts")?;
        loaded.model_metadata = Some(metadata);

        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            root = %self.store.root().display(),
            features = loaded.encoder.n_features(),
            model = loaded.model.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "artifacts loaded"
        );
        Ok(loaded)
    }

    /// Predict the target for one raw record.
    pub fn predict(&self, record: &RawRecord) -> Result<f64> {
        let start = Instant::now();
        let result = record
            .to_dataframe()
            .and_then(|df| self.predict_frame(&df))
            .and_then(|predictions| {
                predictions.first().copied().ok_or_else(|| {
                    PipelineError::upstream(origin!("prediction.predict"), "regressor returned no prediction")
                })
            });
        self.record_call(start, result.as_ref().map(|_| 1).map_err(|_| ()));
        result
    }

    /// Predict the target for every row of a raw table.
    pub fn predict_table(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let start = Instant::now();
        let result = self.predict_frame(df);
        self.record_call(start, result.as_ref().map(|p| p.len() as u64).map_err(|_| ()));
        result
    }

    fn predict_frame(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let artifacts = self.artifacts().context("prediction.predict", "artifacts unavailable")?;
        let encoder = &artifacts.encoder;

        let df = normalize_columns(df)?;
        let df = normalize_strings(&df, encoder.schema().categorical())?;
        let matrix = encoder.transform(&df).context("prediction.predict", "encoding record")?;

        let predictions = artifacts
            .model
            .predict(matrix.features())
            .context("prediction.predict", "running regressor")?;

        if let Some(row) = predictions.iter().position(|p| !p.is_finite()) {
            return Err(PipelineError::upstream(
                origin!("prediction.predict"),
                format!("regressor produced a non-finite prediction for row {}", row),
            ));
        }
        Ok(predictions.to_vec())
    }

    fn record_call(&self, start: Instant, outcome: std::result::Result<u64, ()>) {
        let c = &self.counters;
        c.calls.fetch_add(1, Ordering::Relaxed);
        c.latency_ns
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
        match outcome {
            Ok(rows) => {
                c.predictions.fetch_add(rows, Ordering::Relaxed);
            }
            Err(()) => {
                c.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn stats(&self) -> InferenceStats {
        let c = &self.counters;
        let calls = c.calls.load(Ordering::Relaxed);
        let latency_ns = c.latency_ns.load(Ordering::Relaxed);
        InferenceStats {
            total_predictions: c.predictions.load(Ordering::Relaxed),
            error_count: c.errors.load(Ordering::Relaxed),
            loads: c.loads.load(Ordering::Relaxed),
            avg_latency_ms: if calls > 0 {
                latency_ns as f64 / calls as f64 / 1e6
            } else {
                0.0
            },
            is_loaded: self.is_loaded(),
        }
    }
}
