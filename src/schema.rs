//! Column schema: which columns are numerical, which are categorical, and
//! which one is the regression target.

use crate::error::{PipelineError, Result};
use crate::origin;
use crate::preprocessing::canonical_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Numerical inputs of the car price model, in output order
pub const CAR_NUMERICAL_COLUMNS: [&str; 15] = [
    "car_id",
    "symboling",
    "wheelbase",
    "carlength",
    "carwidth",
    "carheight",
    "curbweight",
    "enginesize",
    "boreratio",
    "stroke",
    "compressionratio",
    "horsepower",
    "peakrpm",
    "citympg",
    "highwaympg",
];

/// Categorical inputs of the car price model, in output order
pub const CAR_CATEGORICAL_COLUMNS: [&str; 10] = [
    "carname",
    "fueltype",
    "aspiration",
    "doornumber",
    "carbody",
    "drivewheel",
    "enginelocation",
    "enginetype",
    "cylindernumber",
    "fuelsystem",
];

/// Regression target of the car price model
pub const CAR_TARGET_COLUMN: &str = "price";

/// Ordered declaration of feature columns and the target.
///
/// Names are stored in canonical form so they line up with tables that went
/// through [`normalize_columns`](crate::preprocessing::normalize_columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    numerical: Vec<String>,
    categorical: Vec<String>,
    target: String,
}

impl Schema {
    /// Build and validate a schema. Names are canonicalized first.
    pub fn new<N, C>(numerical: N, categorical: C, target: &str) -> Result<Self>
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let schema = Self {
            numerical: numerical.into_iter().map(|c| canonical_name(c.as_ref())).collect(),
            categorical: categorical.into_iter().map(|c| canonical_name(c.as_ref())).collect(),
            target: canonical_name(target),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// The fixed schema of the car price dataset.
    pub fn car_price() -> Self {
        Self {
            numerical: CAR_NUMERICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            categorical: CAR_CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            target: CAR_TARGET_COLUMN.to_string(),
        }
    }

    /// Check that the column lists are non-overlapping, free of duplicates,
    /// and do not contain the target.
    pub fn validate(&self) -> Result<()> {
        if self.numerical.is_empty() && self.categorical.is_empty() {
            return Err(PipelineError::schema_mismatch(
                origin!("schema.validate"),
                "<none>",
                "schema declares no feature columns",
            ));
        }
        if self.target.is_empty() {
            return Err(PipelineError::schema_mismatch(
                origin!("schema.validate"),
                "<target>",
                "target column name is empty",
            ));
        }

        let mut seen = HashSet::new();
        for name in self.numerical.iter().chain(self.categorical.iter()) {
            if name.is_empty() {
                return Err(PipelineError::schema_mismatch(
                    origin!("schema.validate"),
                    name,
                    "empty column name",
                ));
            }
            if name == &self.target {
                return Err(PipelineError::schema_mismatch(
                    origin!("schema.validate"),
                    name,
                    "target column is also declared as a feature",
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::schema_mismatch(
                    origin!("schema.validate"),
                    name,
                    "column declared more than once",
                ));
            }
        }
        Ok(())
    }

    pub fn numerical(&self) -> &[String] {
        &self.numerical
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::car_price()
    }
}
