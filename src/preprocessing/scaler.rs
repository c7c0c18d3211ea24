//! Standard (z-score) feature scaling

use crate::error::{PipelineError, Result};
use crate::origin;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    column: String,
    mean: f64,
    std: f64,
}

/// Standard scaler: `(x - mean) / std` with the population standard deviation.
///
/// A column whose training values are constant has no spread to divide by;
/// it scales to `0.0` for every input instead of producing NaN or infinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Default for Scaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler to dense (already imputed) columns, one name per column.
    pub fn fit(&mut self, columns: &[&str], values: &[Vec<f64>]) -> Result<&mut Self> {
        if columns.len() != values.len() {
            return Err(PipelineError::upstream(
                origin!("scaler.fit"),
                format!("{} column names for {} value columns", columns.len(), values.len()),
            ));
        }

        self.params = columns
            .iter()
            .zip(values)
            .map(|(name, column)| Self::compute_params(name, column))
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale dense columns in fit order.
    pub fn transform(&self, values: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if !self.is_fitted {
            return Err(PipelineError::not_fitted(origin!("scaler.transform"), "Scaler"));
        }
        if values.len() != self.params.len() {
            return Err(PipelineError::upstream(
                origin!("scaler.transform"),
                format!("expected {} columns, got {}", self.params.len(), values.len()),
            ));
        }

        Ok(self
            .params
            .iter()
            .zip(values)
            .map(|(params, column)| column.iter().map(|&v| Self::scale_value(v, params)).collect())
            .collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted `(mean, std)` of a column
    pub fn params(&self, column: &str) -> Option<(f64, f64)> {
        self.params
            .iter()
            .find(|p| p.column == column)
            .map(|p| (p.mean, p.std))
    }

    fn compute_params(name: &str, column: &[f64]) -> ScalerParams {
        let ca = Float64Chunked::from_slice(name.into(), column);
        let mean = ca.mean().unwrap_or(0.0);
        let std = ca.std(0).unwrap_or(0.0);
        if std <= f64::EPSILON {
            tracing::debug!(column = %name, "zero-variance column, scaled output fixed at 0.0");
        }
        ScalerParams {
            column: name.to_string(),
            mean,
            std,
        }
    }

    fn scale_value(v: f64, params: &ScalerParams) -> f64 {
        if params.std <= f64::EPSILON {
            0.0
        } else {
            (v - params.mean) / params.std
        }
    }
}
