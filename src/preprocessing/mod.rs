//! Feature preprocessing module
//!
//! Turns raw car tables into numeric feature matrices:
//! - Column-name and value canonicalization
//! - Missing value imputation and standard scaling for numerical columns
//! - One-hot encoding with an explicit unknown-category policy
//! - The composed [`FeatureEncoder`] shared by training and inference

mod encoder;
mod imputer;
mod matrix;
mod normalizer;
mod numerical;
mod pipeline;
mod scaler;

pub use encoder::{CategoricalEncoder, UnknownCategoryPolicy, UNKNOWN_CATEGORY};
pub use imputer::{ImputeStrategy, Imputer};
pub use matrix::FeatureMatrix;
pub use normalizer::{canonical_name, canonical_value, normalize_columns, normalize_strings};
pub use numerical::NumericalEncoder;
pub use pipeline::FeatureEncoder;
pub use scaler::Scaler;

use crate::error::{Origin, PipelineError, Result};
use polars::prelude::*;

/// Cell contents treated as a missing numerical value (compared case-insensitively)
pub const MISSING_MARKERS: [&str; 5] = ["", "?", "na", "nan", "null"];

/// Read a column as `f64` cells, `None` marking a missing value.
///
/// Integer and float columns are cast; string columns are parsed, with
/// [`MISSING_MARKERS`] mapping to `None`. NaN is treated as missing.
pub(crate) fn read_numeric_column(df: &DataFrame, name: &str, origin: Origin) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::schema_mismatch(origin, name, "required numerical column is absent"))?;

    let values: Vec<Option<f64>> = match column.dtype() {
        DataType::String => {
            let ca = column.str().map_err(|e| PipelineError::data(origin, e))?;
            ca.into_iter()
                .map(|cell| parse_numeric_cell(cell, name, origin))
                .collect::<Result<_>>()?
        }
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
        DataType::Float32 | DataType::Float64 | DataType::Boolean | DataType::Null => {
            let casted = column
                .cast(&DataType::Float64)
                .map_err(|e| PipelineError::data(origin, e))?;
            let ca = casted.f64().map_err(|e| PipelineError::data(origin, e))?;
            ca.into_iter().collect()
        }
        other => {
            return Err(PipelineError::schema_mismatch(
                origin,
                name,
                format!("expected a numerical column, found dtype {}", other),
            ))
        }
    };

    Ok(values.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

fn parse_numeric_cell(cell: Option<&str>, column: &str, origin: Origin) -> Result<Option<f64>> {
    let Some(raw) = cell else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if MISSING_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| PipelineError::schema_mismatch(origin, column, format!("`{}` is not a number", raw)))
}

/// Text form of a number used as a category: `2.0` and `2` both read `2`.
pub(crate) fn number_text(value: f64) -> String {
    value.to_string()
}

/// Read a column as string cells. Non-string columns are cast to strings so
/// that a numerically-typed categorical header still encodes. Numbers go
/// through [`number_text`] whatever their dtype.
pub(crate) fn read_string_column(df: &DataFrame, name: &str, origin: Origin) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::schema_mismatch(origin, name, "required categorical column is absent"))?;

    if column.dtype().is_float() || column.dtype().is_integer() {
        let casted = column
            .cast(&DataType::Float64)
            .map_err(|e| PipelineError::data(origin, e))?;
        let ca = casted.f64().map_err(|e| PipelineError::data(origin, e))?;
        return Ok(ca.into_iter().map(|v| v.map(number_text)).collect());
    }

    let casted;
    let column = if column.dtype() == &DataType::String {
        column
    } else {
        casted = column
            .cast(&DataType::String)
            .map_err(|e| PipelineError::data(origin, e))?;
        &casted
    };

    let ca = column.str().map_err(|e| PipelineError::data(origin, e))?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::origin;

    #[test]
    fn test_read_numeric_casts_integers() {
        let df = df!("curbweight" => &[2548i64, 2823]).unwrap();
        let values = read_numeric_column(&df, "curbweight", origin!("test")).unwrap();
        assert_eq!(values, vec![Some(2548.0), Some(2823.0)]);
    }

    #[test]
    fn test_read_numeric_parses_strings_with_markers() {
        let df = df!("stroke" => &[Some("2.68"), Some("?"), None, Some(" NaN "), Some("3.4")]).unwrap();
        let values = read_numeric_column(&df, "stroke", origin!("test")).unwrap();
        assert_eq!(values, vec![Some(2.68), None, None, None, Some(3.4)]);
    }

    #[test]
    fn test_read_numeric_rejects_garbage() {
        let df = df!("stroke" => &["abc"]).unwrap();
        let err = read_numeric_column(&df, "stroke", origin!("test")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_read_numeric_missing_column() {
        let df = df!("other" => &[1.0]).unwrap();
        let err = read_numeric_column(&df, "stroke", origin!("test")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_read_numeric_nan_is_missing() {
        let df = df!("x" => &[1.0, f64::NAN]).unwrap();
        let values = read_numeric_column(&df, "x", origin!("test")).unwrap();
        assert_eq!(values, vec![Some(1.0), None]);
    }

    #[test]
    fn test_read_string_casts_numbers() {
        let df = df!("doornumber" => &[2i64, 4]).unwrap();
        let values = read_string_column(&df, "doornumber", origin!("test")).unwrap();
        assert_eq!(values, vec![Some("2".to_string()), Some("4".to_string())]);
    }

    #[test]
    fn test_read_string_formats_floats_like_integers() {
        let df = df!("doornumber" => &[Some(2.0), Some(4.5), None]).unwrap();
        let values = read_string_column(&df, "doornumber", origin!("test")).unwrap();
        assert_eq!(values, vec![Some("2".to_string()), Some("4.5".to_string()), None]);
    }
}
