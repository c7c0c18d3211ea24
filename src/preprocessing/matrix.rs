//! Dense feature matrix handed to the regressor

use ndarray::{s, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Rows are records; columns are `[numerical][categorical][target?]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    values: Array2<f64>,
    feature_names: Vec<String>,
    target: Option<String>,
}

impl FeatureMatrix {
    pub(crate) fn new(values: Array2<f64>, feature_names: Vec<String>, target: Option<String>) -> Self {
        debug_assert_eq!(
            values.ncols(),
            feature_names.len() + usize::from(target.is_some())
        );
        Self {
            values,
            feature_names,
            target,
        }
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Total column count, target included
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Number of feature columns, target excluded
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Name of the trailing target column, if this is a labeled matrix
    pub fn target_name(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// The whole matrix, target column included
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Feature columns only
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.values.slice(s![.., ..self.feature_names.len()])
    }

    /// Target column, if present
    pub fn target(&self) -> Option<ArrayView1<'_, f64>> {
        self.target
            .as_ref()
            .map(|_| self.values.column(self.feature_names.len()))
    }
}
