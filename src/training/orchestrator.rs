//! Training orchestration: raw tables in, fitted artifacts and matrices out

use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use super::linear_models::{RegressionModel, Regressor};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::origin;
use crate::export::{ArtifactMetadata, ArtifactStore, MODEL_KEY, PREPROCESSOR_KEY};
use crate::preprocessing::{normalize_columns, normalize_strings, FeatureEncoder, FeatureMatrix};
use crate::schema::Schema;
use crate::utils::DataLoader;

/// Result of [`TrainingOrchestrator::run`]
#[derive(Debug, Clone)]
pub struct TrainingOutput {
    /// Labeled training matrix (target in the last column)
    pub train_matrix: FeatureMatrix,
    /// Labeled test matrix, encoded with the training fit
    pub test_matrix: FeatureMatrix,
    /// Logical key the fitted encoder was saved under
    pub artifact_key: String,
    pub artifact_path: PathBuf,
    pub encoder: FeatureEncoder,
}

/// Summary of a full training run including the regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_name: String,
    pub n_features: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_r2: f64,
    pub test_r2: f64,
    pub preprocessor_path: PathBuf,
    pub model_path: PathBuf,
    pub elapsed_secs: f64,
}

/// Drives normalization, encoder fitting and artifact persistence.
///
/// The feature encoder is fitted on the training table only; the test table
/// is always encoded with the training fit.
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    schema: Schema,
    config: PipelineConfig,
    store: ArtifactStore,
    loader: DataLoader,
}

impl TrainingOrchestrator {
    pub fn new(schema: Schema, config: PipelineConfig) -> Self {
        let store = ArtifactStore::from_config(&config);
        Self {
            schema,
            config,
            store,
            loader: DataLoader::new(),
        }
    }

    /// Orchestrator for the car price schema
    pub fn car_price(config: PipelineConfig) -> Self {
        Self::new(Schema::car_price(), config)
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Canonicalize column names and categorical values of a raw table.
    pub fn prepare(&self, df: &DataFrame) -> Result<DataFrame> {
        let df = normalize_columns(df)?;
        normalize_strings(&df, self.schema.categorical())
    }

    /// Fit the encoder on `train` and encode both tables with that fit.
    pub fn fit_tables(&self, train: &DataFrame, test: &DataFrame) -> Result<(FeatureEncoder, FeatureMatrix, FeatureMatrix)> {
        let train = self.prepare(train).context("training.fit_tables", "normalizing train table")?;
        let test = self.prepare(test).context("training.fit_tables", "normalizing test table")?;

        let mut encoder = FeatureEncoder::with_config(self.schema.clone(), &self.config);
        let train_matrix = encoder
            .fit_transform(&train)
            .context("training.fit_tables", "encoding train table")?;
        let test_matrix = encoder
            .transform_labeled(&test)
            .context("training.fit_tables", "encoding test table")?;

        Ok((encoder, train_matrix, test_matrix))
    }

    /// Load both tables, fit on train, save the `preprocessor` artifact and
    /// return both labeled matrices.
    pub fn run(&self, train_path: impl AsRef<Path>, test_path: impl AsRef<Path>) -> Result<TrainingOutput> {
        let train_path = train_path.as_ref();
        let test_path = test_path.as_ref();

        let train = self.loader.load_auto(train_path)?;
        let test = self.loader.load_auto(test_path)?;
        tracing::info!(
            train = %train_path.display(),
            test = %test_path.display(),
            train_rows = train.height(),
            test_rows = test.height(),
            "read train and test data"
        );

        let (encoder, train_matrix, test_matrix) = self.fit_tables(&train, &test)?;

        let metadata = ArtifactMetadata::new(PREPROCESSOR_KEY, "FeatureEncoder")
            .with_features(encoder.feature_names())
            .with_target(self.schema.target());
        let artifact_path = self
            .store
            .save(PREPROCESSOR_KEY, &encoder, metadata)
            .context("training.run", "saving preprocessor")?;

        Ok(TrainingOutput {
            train_matrix,
            test_matrix,
            artifact_key: PREPROCESSOR_KEY.to_string(),
            artifact_path,
            encoder,
        })
    }

    /// [`run`](Self::run), then fit the ridge regressor on the training
    /// matrix, score it on both matrices and save it as `model`.
    pub fn train_and_save(&self, train_path: impl AsRef<Path>, test_path: impl AsRef<Path>) -> Result<TrainingReport> {
        let start = Instant::now();
        let output = self.run(train_path, test_path)?;

        let train_y = output.train_matrix.target().ok_or_else(|| {
            PipelineError::upstream(origin!("training.train_and_save"), "train matrix has no target")
        })?;
        let test_y = output.test_matrix.target().ok_or_else(|| {
            PipelineError::upstream(origin!("training.train_and_save"), "test matrix has no target")
        })?;

        let mut model = RegressionModel::ridge(self.config.ridge_alpha);
        model
            .fit(output.train_matrix.features(), train_y)
            .context("training.train_and_save", "fitting regressor")?;
        let train_r2 = model.score(output.train_matrix.features(), train_y)?;
        let test_r2 = model.score(output.test_matrix.features(), test_y)?;
        tracing::info!(model = model.name(), train_r2, test_r2, "regressor evaluated");

        let metadata = ArtifactMetadata::new(MODEL_KEY, model.name())
            .with_features(output.encoder.feature_names())
            .with_target(self.schema.target())
            .add_metric("train_r2", train_r2)
            .add_metric("test_r2", test_r2);
        let model_path = self
            .store
            .save(MODEL_KEY, &model, metadata)
            .context("training.train_and_save", "saving model")?;

        Ok(TrainingReport {
            model_name: model.name().to_string(),
            n_features: output.encoder.n_features(),
            train_rows: output.train_matrix.nrows(),
            test_rows: output.test_matrix.nrows(),
            train_r2,
            test_r2,
            preprocessor_path: output.artifact_path,
            model_path,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }
}
