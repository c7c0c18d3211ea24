//! One-hot categorical encoding

use super::read_string_column;
use crate::error::{PipelineError, Result};
use crate::origin;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Category label of the per-column unknown bucket
pub const UNKNOWN_CATEGORY: &str = "__unknown__";

/// What to do with a categorical value that was not seen during fit.
///
/// The policy is captured at fit time and serialized with the encoder, so
/// every process that loads a fitted encoder applies the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownCategoryPolicy {
    /// Each column owns one extra output position; unseen and missing values set it.
    UnknownBucket,
    /// Unseen and missing values fail with `UnknownCategory`.
    Error,
}

impl Default for UnknownCategoryPolicy {
    fn default() -> Self {
        UnknownCategoryPolicy::UnknownBucket
    }
}

/// Vocabulary learned for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnVocabulary {
    column: String,
    /// Sorted, so lookups are a binary search
    categories: Vec<String>,
    offset: usize,
    unknown_slot: Option<usize>,
}

impl ColumnVocabulary {
    fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|idx| self.offset + idx)
    }

    fn width(&self) -> usize {
        self.categories.len() + usize::from(self.unknown_slot.is_some())
    }
}

/// One-hot encoder with a vocabulary fixed at fit time.
///
/// Output positions are laid out column by column in fit order; inside a
/// column, categories are sorted, followed by the unknown bucket when the
/// policy has one. The output width never changes after fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    policy: UnknownCategoryPolicy,
    vocabularies: Vec<ColumnVocabulary>,
    width: usize,
    is_fitted: bool,
}

impl CategoricalEncoder {
    /// Create a new encoder
    pub fn new(policy: UnknownCategoryPolicy) -> Self {
        Self {
            policy,
            vocabularies: Vec::new(),
            width: 0,
            is_fitted: false,
        }
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut vocabularies = Vec::with_capacity(columns.len());
        let mut offset = 0usize;

        for col_name in columns {
            let values = read_string_column(df, col_name, origin!("categorical.fit"))?;
            let categories: Vec<String> = values
                .into_iter()
                .flatten()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let unknown_slot = match self.policy {
                UnknownCategoryPolicy::UnknownBucket => Some(offset + categories.len()),
                UnknownCategoryPolicy::Error => None,
            };
            let vocabulary = ColumnVocabulary {
                column: col_name.clone(),
                categories,
                offset,
                unknown_slot,
            };
            offset += vocabulary.width();
            tracing::debug!(
                column = %col_name,
                categories = vocabulary.categories.len(),
                "categorical vocabulary built"
            );
            vocabularies.push(vocabulary);
        }

        self.vocabularies = vocabularies;
        self.width = offset;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode `df` into a `rows × width` one-hot block.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::not_fitted(origin!("categorical.transform"), "CategoricalEncoder"));
        }

        let mut out = Array2::zeros((df.height(), self.width));

        for vocabulary in &self.vocabularies {
            let values = read_string_column(df, &vocabulary.column, origin!("categorical.transform"))?;

            for (row, value) in values.iter().enumerate() {
                let position = match value.as_deref().and_then(|v| vocabulary.position(v)) {
                    Some(pos) => pos,
                    None => self.unknown_position(vocabulary, value.as_deref())?,
                };
                out[[row, position]] = 1.0;
            }
        }

        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn unknown_position(&self, vocabulary: &ColumnVocabulary, value: Option<&str>) -> Result<usize> {
        match vocabulary.unknown_slot {
            Some(slot) => {
                tracing::debug!(
                    column = %vocabulary.column,
                    value = value.unwrap_or("<missing>"),
                    "routing unseen category to unknown bucket"
                );
                Ok(slot)
            }
            None => Err(PipelineError::unknown_category(
                origin!("categorical.transform"),
                vocabulary.column.clone(),
                value.unwrap_or("<missing>"),
            )),
        }
    }

    /// Output feature names (`column=category`), in output order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width);
        for vocabulary in &self.vocabularies {
            for category in &vocabulary.categories {
                names.push(format!("{}={}", vocabulary.column, category));
            }
            if vocabulary.unknown_slot.is_some() {
                names.push(format!("{}={}", vocabulary.column, UNKNOWN_CATEGORY));
            }
        }
        names
    }

    /// Learned categories of a column, sorted
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.vocabularies
            .iter()
            .find(|v| v.column == column)
            .map(|v| v.categories.as_slice())
    }

    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
