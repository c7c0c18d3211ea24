//! Column-name and string-value canonicalization
//!
//! Training tables and inference records go through the same two functions
//! before any encoding, so a `CarName` form field and a `carname` CSV header
//! (or `Alfa Romero` vs `alfa romero`) end up identical.

use crate::error::{PipelineError, Result};
use crate::origin;
use polars::prelude::*;
use std::collections::HashSet;

/// Canonical form of a column name: trimmed, lower-cased, whitespace as `_`.
pub fn canonical_name(name: &str) -> String {
    canonicalize(name)
}

/// Canonical form of a categorical cell value.
pub fn canonical_value(value: &str) -> String {
    canonicalize(value)
}

fn canonicalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Rename every column to its canonical name.
///
/// Renaming is total except for one case: two source columns that collapse
/// onto the same canonical name (`CarName` and `carname`) are a
/// `SchemaMismatch` error. Neither column is dropped, since either could
/// hold the values the caller meant.
pub fn normalize_columns(df: &DataFrame) -> Result<DataFrame> {
    let mut seen = HashSet::with_capacity(df.width());
    let mut columns = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        let name = canonical_name(col.name());
        if !seen.insert(name.clone()) {
            return Err(PipelineError::schema_mismatch(
                origin!("normalizer.normalize_columns"),
                name,
                format!("column `{}` collides with another column after normalization", col.name()),
            ));
        }
        columns.push(col.clone().with_name(name.into()));
    }

    DataFrame::new(columns).map_err(|e| PipelineError::data(origin!("normalizer.normalize_columns"), e))
}

/// Canonicalize the values of the named string columns.
///
/// Columns that are absent or not string-typed are left untouched, as are
/// null cells.
pub fn normalize_strings<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<DataFrame> {
    let mut result = df.clone();

    for col_name in columns {
        let col_name = col_name.as_ref();
        let Ok(column) = df.column(col_name) else {
            continue;
        };
        if column.dtype() != &DataType::String {
            continue;
        }

        let ca = column
            .str()
            .map_err(|e| PipelineError::data(origin!("normalizer.normalize_strings"), e))?;
        let normalized: StringChunked = ca.into_iter().map(|v| v.map(canonical_value)).collect();

        result
            .with_column(normalized.with_name(column.name().clone()).into_series())
            .map_err(|e| PipelineError::data(origin!("normalizer.normalize_strings"), e))?;
    }

    Ok(result)
}
