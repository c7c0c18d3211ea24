//! Numerical encoder: impute missing values, then standardize

use super::{ImputeStrategy, Imputer, Scaler};
use crate::error::{PipelineError, Result};
use crate::origin;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Imputer followed by a standard scaler over a fixed, ordered column list.
///
/// The scaler is fitted on imputed training values, so a filled cell and an
/// observed cell with the same value encode identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericalEncoder {
    columns: Vec<String>,
    imputer: Imputer,
    scaler: Scaler,
    is_fitted: bool,
}

impl NumericalEncoder {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            columns: Vec::new(),
            imputer: Imputer::new(strategy),
            scaler: Scaler::new(),
            is_fitted: false,
        }
    }

    /// Learn fill values and scaling parameters for `columns`.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let cols: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();

        let imputed = self.imputer.fit_transform(df, &cols)?;
        self.scaler.fit(&cols, &imputed)?;

        self.columns = columns.to_vec();
        self.is_fitted = true;
        tracing::debug!(columns = self.columns.len(), rows = df.height(), "numerical encoder fitted");
        Ok(self)
    }

    /// Encode `df` into a `rows × columns` block in fit order.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::not_fitted(origin!("numerical.transform"), "NumericalEncoder"));
        }

        let imputed = self.imputer.transform_columns(df)?;
        let scaled = self.scaler.transform(&imputed)?;

        let n_rows = df.height();
        let mut out = Array2::zeros((n_rows, self.columns.len()));
        for (j, column) in scaled.iter().enumerate() {
            for (i, &v) in column.iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Output column names, in output order
    pub fn feature_names(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn imputer(&self) -> &Imputer {
        &self.imputer
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }
}
