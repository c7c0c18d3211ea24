//! Feature encoder: numerical and categorical encoders composed over a schema

use super::{
    read_numeric_column, CategoricalEncoder, FeatureMatrix, ImputeStrategy, NumericalEncoder,
    UnknownCategoryPolicy,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::origin;
use crate::schema::Schema;
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Fitted state shared by training and inference.
///
/// Both sub-encoders are fitted on the same canonicalized training table and
/// applied independently; their outputs are concatenated numerical first,
/// categorical second. Training matrices carry the target as a final column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    schema: Schema,
    numerical: NumericalEncoder,
    categorical: CategoricalEncoder,
    is_fitted: bool,
    /// Rows seen by the last fit
    fitted_rows: usize,
    /// Seconds spent in the last fit
    fit_time: Option<f64>,
}

impl FeatureEncoder {
    /// Create an unfitted encoder with explicit sub-encoder policies
    pub fn new(schema: Schema, impute: ImputeStrategy, unknown: UnknownCategoryPolicy) -> Self {
        Self {
            schema,
            numerical: NumericalEncoder::new(impute),
            categorical: CategoricalEncoder::new(unknown),
            is_fitted: false,
            fitted_rows: 0,
            fit_time: None,
        }
    }

    /// Create an unfitted encoder using the policies from `config`
    pub fn with_config(schema: Schema, config: &PipelineConfig) -> Self {
        Self::new(schema, config.numeric_impute.clone(), config.unknown_category)
    }

    /// Fit both sub-encoders on a canonicalized training table.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        if df.height() == 0 {
            return Err(PipelineError::schema_mismatch(
                origin!("feature_encoder.fit"),
                "<rows>",
                "cannot fit on an empty table",
            ));
        }

        // fit copies so a failed refit leaves the previous fit in place
        let mut numerical = self.numerical.clone();
        let mut categorical = self.categorical.clone();
        let schema = &self.schema;
        let (num, cat) = rayon::join(
            || numerical.fit(df, schema.numerical()).map(|_| ()),
            || categorical.fit(df, schema.categorical()).map(|_| ()),
        );
        num.context("feature_encoder.fit", "numerical block")?;
        cat.context("feature_encoder.fit", "categorical block")?;

        self.numerical = numerical;
        self.categorical = categorical;
        self.is_fitted = true;
        self.fitted_rows = df.height();
        self.fit_time = Some(start.elapsed().as_secs_f64());
        tracing::info!(
            rows = df.height(),
            numerical = self.numerical.width(),
            categorical = self.categorical.width(),
            "feature encoder fitted"
        );
        Ok(self)
    }

    /// Fit, then encode the same table with its target appended.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<FeatureMatrix> {
        self.fit(df)?;
        self.transform_labeled(df)
    }

    /// Encode feature columns only. Any target column in `df` is ignored.
    pub fn transform(&self, df: &DataFrame) -> Result<FeatureMatrix> {
        let features = self.encode_features(df)?;
        Ok(FeatureMatrix::new(features, self.feature_names(), None))
    }

    /// Encode feature columns and append the target as the final column.
    pub fn transform_labeled(&self, df: &DataFrame) -> Result<FeatureMatrix> {
        let features = self.encode_features(df)?;
        let target = self.read_target(df)?;

        let values = concatenate(Axis(1), &[features.view(), target.view()]).map_err(|e| {
            PipelineError::upstream_with_source(origin!("feature_encoder.transform_labeled"), "appending target", e)
        })?;
        Ok(FeatureMatrix::new(
            values,
            self.feature_names(),
            Some(self.schema.target().to_string()),
        ))
    }

    fn encode_features(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::not_fitted(origin!("feature_encoder.transform"), "FeatureEncoder"));
        }

        let num = self
            .numerical
            .transform(df)
            .context("feature_encoder.transform", "numerical block")?;
        let cat = self
            .categorical
            .transform(df)
            .context("feature_encoder.transform", "categorical block")?;

        concatenate(Axis(1), &[num.view(), cat.view()]).map_err(|e| {
            PipelineError::upstream_with_source(origin!("feature_encoder.transform"), "concatenating blocks", e)
        })
    }

    fn read_target(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let target = self.schema.target();
        let values = read_numeric_column(df, target, origin!("feature_encoder.read_target"))?;

        let mut out = Array2::zeros((values.len(), 1));
        for (i, v) in values.into_iter().enumerate() {
            out[[i, 0]] = v.ok_or_else(|| {
                PipelineError::schema_mismatch(
                    origin!("feature_encoder.read_target"),
                    target,
                    format!("missing target value in row {}", i),
                )
            })?;
        }
        Ok(out)
    }

    /// Output feature names: numerical columns, then `column=category` slots
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numerical.feature_names().to_vec();
        names.extend(self.categorical.feature_names());
        names
    }

    /// Number of feature columns produced by `transform`
    pub fn n_features(&self) -> usize {
        self.numerical.width() + self.categorical.width()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn numerical(&self) -> &NumericalEncoder {
        &self.numerical
    }

    pub fn categorical(&self) -> &CategoricalEncoder {
        &self.categorical
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fitted_rows(&self) -> usize {
        self.fitted_rows
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }
}
