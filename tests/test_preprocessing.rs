//! Integration test: column normalizer and feature encoder

use carprice::error::ErrorKind;
use carprice::preprocessing::{
    normalize_columns, normalize_strings, FeatureEncoder, ImputeStrategy, UnknownCategoryPolicy,
};
use carprice::schema::Schema;
use polars::prelude::*;

fn schema() -> Schema {
    Schema::new(["wheelbase", "horsepower"], ["fueltype", "car_body"], "price").unwrap()
}

fn raw_train() -> DataFrame {
    df!(
        " WheelBase " => &[88.6, 99.8, 94.5, 96.5, 102.4],
        "HorsePower" => &[111.0, 154.0, 102.0, 115.0, 140.0],
        "FuelType" => &["Gas", "diesel", " gas", "GAS", "Diesel"],
        "Car Body" => &["Hard Top", "sedan", "hatchback", "sedan", "hard top"],
        "price" => &[13495.0, 16500.0, 13950.0, 17450.0, 18920.0],
    )
    .unwrap()
}

fn canonical(df: &DataFrame, schema: &Schema) -> DataFrame {
    let df = normalize_columns(df).unwrap();
    normalize_strings(&df, schema.categorical()).unwrap()
}

#[test]
fn test_normalize_columns_idempotent() {
    let once = normalize_columns(&raw_train()).unwrap();
    let twice = normalize_columns(&once).unwrap();

    let names: Vec<&str> = once.get_column_names().iter().map(|n| n.as_str()).collect();
    assert_eq!(names, vec!["wheelbase", "horsepower", "fueltype", "car_body", "price"]);
    assert!(once.equals_missing(&twice));
}

#[test]
fn test_normalize_strings_idempotent() {
    let df = normalize_columns(&raw_train()).unwrap();
    let cols = ["fueltype", "car_body"];

    let once = normalize_strings(&df, &cols).unwrap();
    let twice = normalize_strings(&once, &cols).unwrap();
    assert!(once.equals_missing(&twice));

    let body: Vec<Option<&str>> = once.column("car_body").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(body[0], Some("hard_top"));
    assert_eq!(body[4], Some("hard_top"));
}

#[test]
fn test_normalize_strings_leaves_numbers_and_nulls() {
    let df = df!(
        "wheelbase" => &[88.6, 99.8],
        "fueltype" => &[Some("Gas"), None],
    )
    .unwrap();

    let out = normalize_strings(&df, &["wheelbase", "fueltype", "absent"]).unwrap();
    let wheelbase: Vec<Option<f64>> = out.column("wheelbase").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(wheelbase, vec![Some(88.6), Some(99.8)]);
    assert_eq!(out.column("fueltype").unwrap().null_count(), 1);
}

#[test]
fn test_normalize_columns_collision() {
    let df = df!("CarName" => &["a"], "carname" => &["b"]).unwrap();
    let err = normalize_columns(&df).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[test]
fn test_fueltype_wheelbase_scenario() {
    let schema = Schema::new(["wheelbase"], ["fueltype"], "price").unwrap();
    let train = df!(
        "fueltype" => &["gas", "diesel", "gas"],
        "wheelbase" => &[88.6, 99.8, 94.5],
        "price" => &[13495.0, 16500.0, 13950.0],
    )
    .unwrap();

    let mut encoder = FeatureEncoder::new(schema, ImputeStrategy::Median, UnknownCategoryPolicy::Error);
    encoder.fit(&train).unwrap();

    let row = df!("fueltype" => &["gas"], "wheelbase" => &[90.0]).unwrap();
    let m = encoder.transform(&row).unwrap();

    let values = [88.6_f64, 99.8, 94.5];
    let mean = values.iter().sum::<f64>() / 3.0;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0).sqrt();

    let col = |name: &str| m.feature_names().iter().position(|n| n == name).unwrap();
    assert_eq!(m.values()[[0, col("fueltype=gas")]], 1.0);
    assert_eq!(m.values()[[0, col("fueltype=diesel")]], 0.0);
    assert!((m.values()[[0, col("wheelbase")]] - (90.0 - mean) / std).abs() < 1e-9);
}

#[test]
fn test_train_apply_parity() {
    let schema = schema();
    let train = canonical(&raw_train(), &schema);

    let mut encoder = FeatureEncoder::new(schema, ImputeStrategy::Median, UnknownCategoryPolicy::UnknownBucket);
    let fitted = encoder.fit_transform(&train).unwrap();
    let applied = encoder.transform_labeled(&train).unwrap();

    for row in 0..fitted.nrows() {
        assert_eq!(fitted.values().row(row), applied.values().row(row));
    }
}

#[test]
fn test_column_order_stable_across_calls() {
    let schema = schema();
    let train = canonical(&raw_train(), &schema);
    let mut encoder = FeatureEncoder::new(schema, ImputeStrategy::Median, UnknownCategoryPolicy::UnknownBucket);
    encoder.fit(&train).unwrap();

    // same columns, different physical order in the input table
    let shuffled = train.select(["price", "car_body", "horsepower", "fueltype", "wheelbase"]).unwrap();

    let a = encoder.transform(&train).unwrap();
    let b = encoder.transform(&shuffled).unwrap();
    assert_eq!(a.feature_names(), b.feature_names());
    assert_eq!(a.values(), b.values());
    assert_eq!(
        &a.feature_names()[..2],
        &["wheelbase".to_string(), "horsepower".to_string()]
    );
}

#[test]
fn test_unseen_category_policy_is_consistent() {
    let schema = schema();
    let train = canonical(&raw_train(), &schema);
    let row = df!(
        "wheelbase" => &[95.0],
        "horsepower" => &[120.0],
        "fueltype" => &["electric"],
        "car_body" => &["sedan"],
    )
    .unwrap();

    let mut bucket = FeatureEncoder::new(schema.clone(), ImputeStrategy::Median, UnknownCategoryPolicy::UnknownBucket);
    bucket.fit(&train).unwrap();
    let first = bucket.transform(&row).unwrap();
    let second = bucket.transform(&row).unwrap();
    assert_eq!(first, second);
    let unknown = first.feature_names().iter().position(|n| n == "fueltype=__unknown__").unwrap();
    assert_eq!(first.values()[[0, unknown]], 1.0);

    let mut strict = FeatureEncoder::new(schema, ImputeStrategy::Median, UnknownCategoryPolicy::Error);
    strict.fit(&train).unwrap();
    for _ in 0..3 {
        assert_eq!(strict.transform(&row).unwrap_err().kind(), ErrorKind::UnknownCategory);
    }
}

#[test]
fn test_missing_numerical_imputed_with_fit_median() {
    let schema = schema();
    let train = canonical(&raw_train(), &schema);
    let mut encoder = FeatureEncoder::new(schema, ImputeStrategy::Median, UnknownCategoryPolicy::UnknownBucket);
    encoder.fit(&train).unwrap();

    let missing = df!(
        "wheelbase" => &["?"],
        "horsepower" => &["120"],
        "fueltype" => &["gas"],
        "car_body" => &["sedan"],
    )
    .unwrap();
    let median = df!(
        "wheelbase" => &[96.5],
        "horsepower" => &[120.0],
        "fueltype" => &["gas"],
        "car_body" => &["sedan"],
    )
    .unwrap();

    let a = encoder.transform(&missing).unwrap();
    let b = encoder.transform(&median).unwrap();
    assert_eq!(a.values(), b.values());
}

#[test]
fn test_output_width_fixed_after_fit() {
    let schema = schema();
    let train = canonical(&raw_train(), &schema);
    let mut encoder = FeatureEncoder::new(schema, ImputeStrategy::Median, UnknownCategoryPolicy::UnknownBucket);
    let fitted = encoder.fit_transform(&train).unwrap();

    let novel = df!(
        "wheelbase" => &[95.0, 97.0, 99.0],
        "horsepower" => &[120.0, 130.0, 140.0],
        "fueltype" => &["hydrogen", "electric", "lpg"],
        "car_body" => &["wagon", "coupe", "pickup"],
    )
    .unwrap();
    let applied = encoder.transform(&novel).unwrap();
    assert_eq!(applied.n_features(), fitted.n_features());
}
