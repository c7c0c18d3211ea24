//! Missing value imputation for numerical columns

use super::read_numeric_column;
use crate::error::{PipelineError, Result};
use crate::origin;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean
    Mean,
    /// Replace with median
    Median,
    /// Replace with a constant value
    Constant(f64),
}

/// Fill value learned for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FillValue {
    column: String,
    value: f64,
}

/// Imputer for handling missing numerical values.
///
/// Fill values are kept in fit order, which is also the order of the
/// columns returned by [`Imputer::transform_columns`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: Vec<FillValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the imputer to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut fill_values = Vec::with_capacity(columns.len());
        for col_name in columns {
            let values = read_numeric_column(df, col_name, origin!("imputer.fit"))?;
            let value = self.compute_fill_value(col_name, &values);
            fill_values.push(FillValue {
                column: col_name.to_string(),
                value,
            });
        }

        self.fill_values = fill_values;
        self.is_fitted = true;
        Ok(self)
    }

    /// Impute every fitted column, returning dense values in fit order.
    pub fn transform_columns(&self, df: &DataFrame) -> Result<Vec<Vec<f64>>> {
        if !self.is_fitted {
            return Err(PipelineError::not_fitted(origin!("imputer.transform"), "Imputer"));
        }

        self.fill_values
            .iter()
            .map(|fill| {
                let values = read_numeric_column(df, &fill.column, origin!("imputer.transform"))?;
                Ok(values.into_iter().map(|v| v.unwrap_or(fill.value)).collect())
            })
            .collect()
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<Vec<Vec<f64>>> {
        self.fit(df, columns)?;
        self.transform_columns(df)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Learned fill value for a column
    pub fn fill_value(&self, column: &str) -> Option<f64> {
        self.fill_values
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.value)
    }

    fn compute_fill_value(&self, column: &str, values: &[Option<f64>]) -> f64 {
        let ca: Float64Chunked = values.iter().copied().collect();
        let value = match &self.strategy {
            ImputeStrategy::Mean => ca.mean(),
            ImputeStrategy::Median => ca.median(),
            ImputeStrategy::Constant(val) => Some(*val),
        };

        value.unwrap_or_else(|| {
            tracing::warn!(column = %column, "no observed values to impute from, filling with 0.0");
            0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_imputer_creation() {
        let imputer = Imputer::new(ImputeStrategy::Median);
        assert!(!imputer.is_fitted());
    }

    #[test]
    fn test_impute_strategy_serialize() {
        let strategy = ImputeStrategy::Constant(5.0);
        let json = serde_json::to_string(&strategy).unwrap();
        assert!(json.contains("Constant"));
        assert!(json.contains("5"));
    }

    #[test]
    fn test_median_imputation() {
        let df = DataFrame::new(vec![
            Column::new("a".into(), &[Some(1.0), None, Some(3.0), Some(10.0)]),
        ])
        .unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let result = imputer.fit_transform(&df, &["a"]).unwrap();

        assert_eq!(imputer.fill_value("a"), Some(3.0));
        assert_eq!(result[0], vec![1.0, 3.0, 3.0, 10.0]);
    }

    #[test]
    fn test_mean_imputation() {
        let df = DataFrame::new(vec![
            Column::new("a".into(), &[Some(1.0), None, Some(3.0), Some(4.0)]),
        ])
        .unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        let result = imputer.fit_transform(&df, &["a"]).unwrap();

        // Mean of [1, 3, 4] = 8/3
        assert!((result[0][1] - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("a" => &[1.0]).unwrap();
        let imputer = Imputer::new(ImputeStrategy::Median);
        let err = imputer.transform_columns(&df).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFitted);
    }

    #[test]
    fn test_transform_missing_column() {
        let train = df!("a" => &[1.0, 2.0]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        imputer.fit(&train, &["a"]).unwrap();

        let other = df!("b" => &[1.0]).unwrap();
        let err = imputer.transform_columns(&other).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_all_missing_column_fills_zero() {
        let df = DataFrame::new(vec![Column::new("a".into(), &[None::<f64>, None])]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let result = imputer.fit_transform(&df, &["a"]).unwrap();
        assert_eq!(result[0], vec![0.0, 0.0]);
    }
}
