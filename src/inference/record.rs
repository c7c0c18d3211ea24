//! Inbound records for prediction

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::origin;
use crate::preprocessing::number_text;

/// One raw cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Number(v as f64)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(RawValue::Missing, Into::into)
    }
}

impl RawValue {
    fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Number(v) => Some(number_text(*v)),
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Missing => None,
        }
    }
}

/// A single row as a mapping from (raw, uncanonicalized) column name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a field
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<RawValue> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Single-row table with one column per field
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        records_to_dataframe(std::slice::from_ref(self))
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Build a table from records. A column holding only numbers (or missing
/// values) becomes `Float64`; any text makes it a string column. Fields a
/// record does not carry are null.
pub fn records_to_dataframe(records: &[RawRecord]) -> Result<DataFrame> {
    let names: BTreeSet<&str> = records.iter().flat_map(|r| r.names()).collect();
    if names.is_empty() {
        return Err(PipelineError::schema_mismatch(
            origin!("record.to_dataframe"),
            "<record>",
            "record has no fields",
        ));
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let values: Vec<Option<&RawValue>> = records.iter().map(|r| r.get(name)).collect();

        let is_text = values.iter().any(|v| matches!(v, Some(RawValue::Text(_))));
        let column = if is_text {
            let cells: Vec<Option<String>> = values.iter().map(|v| v.and_then(RawValue::as_text)).collect();
            Column::new(name.into(), cells)
        } else {
            let cells: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    Some(RawValue::Number(x)) => Some(*x),
                    _ => None,
                })
                .collect();
            Column::new(name.into(), cells)
        };
        columns.push(column);
    }

    DataFrame::new(columns).map_err(|e| PipelineError::data(origin!("record.to_dataframe"), e))
}

/// The car attributes collected by the web form, with the form's field names.
///
/// `price` is only present on labeled rows and is ignored for prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarFeatures {
    #[serde(rename = "car_ID")]
    pub car_id: i64,
    pub symboling: i64,
    pub wheelbase: f64,
    pub carlength: f64,
    pub carwidth: f64,
    pub carheight: f64,
    pub curbweight: f64,
    pub enginesize: f64,
    pub boreratio: f64,
    pub stroke: f64,
    pub compressionratio: f64,
    pub horsepower: f64,
    pub peakrpm: f64,
    pub citympg: f64,
    pub highwaympg: f64,
    #[serde(rename = "CarName")]
    pub car_name: String,
    pub fueltype: String,
    pub aspiration: String,
    pub doornumber: String,
    pub carbody: String,
    pub drivewheel: String,
    pub enginelocation: String,
    pub enginetype: String,
    pub cylindernumber: String,
    pub fuelsystem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl CarFeatures {
    /// Raw record keyed by the form field names (`car_ID`, `CarName`, ...)
    pub fn into_record(self) -> RawRecord {
        let mut record = RawRecord::new()
            .with("car_ID", self.car_id)
            .with("symboling", self.symboling)
            .with("wheelbase", self.wheelbase)
            .with("carlength", self.carlength)
            .with("carwidth", self.carwidth)
            .with("carheight", self.carheight)
            .with("curbweight", self.curbweight)
            .with("enginesize", self.enginesize)
            .with("boreratio", self.boreratio)
            .with("stroke", self.stroke)
            .with("compressionratio", self.compressionratio)
            .with("horsepower", self.horsepower)
            .with("peakrpm", self.peakrpm)
            .with("citympg", self.citympg)
            .with("highwaympg", self.highwaympg)
            .with("CarName", self.car_name)
            .with("fueltype", self.fueltype)
            .with("aspiration", self.aspiration)
            .with("doornumber", self.doornumber)
            .with("carbody", self.carbody)
            .with("drivewheel", self.drivewheel)
            .with("enginelocation", self.enginelocation)
            .with("enginetype", self.enginetype)
            .with("cylindernumber", self.cylindernumber)
            .with("fuelsystem", self.fuelsystem);
        if let Some(price) = self.price {
            record.insert("price", price);
        }
        record
    }
}

impl From<CarFeatures> for RawRecord {
    fn from(features: CarFeatures) -> Self {
        features.into_record()
    }
}
