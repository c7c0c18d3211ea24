//! Data loading utilities

use crate::error::{PipelineError, Result};
use crate::origin;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// Table loader for the training and batch-prediction inputs.
///
/// Column types are inferred from every row, so a missing-value marker such
/// as `?` deep in a numeric column turns the column into text instead of
/// failing the parse. The encoders read such columns back as numbers.
#[derive(Debug, Clone)]
pub struct DataLoader {
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self { separator: b',' }
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path).map_err(|e| PipelineError::io(origin!("data_loader.load_csv"), path, e))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::data(origin!("data_loader.load_csv"), e))?;

        tracing::info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "table loaded"
        );
        Ok(df)
    }

    /// Load a JSON array of records, or JSON lines for `.jsonl`/`.ndjson`
    pub fn load_json(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PipelineError::io(origin!("data_loader.load_json"), path, e))?;

        let format = match extension(path).as_deref() {
            Some("jsonl") | Some("ndjson") => JsonFormat::JsonLines,
            _ => JsonFormat::Json,
        };

        let df = JsonReader::new(file)
            .with_json_format(format)
            .infer_schema_len(None)
            .finish()
            .map_err(|e| PipelineError::data(origin!("data_loader.load_json"), e))?;

        tracing::info!(path = %path.display(), rows = df.height(), columns = df.width(), "table loaded");
        Ok(df)
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("json") | Some("jsonl") | Some("ndjson") => self.load_json(path),
            Some("tsv") => self.clone().with_separator(b'\t').load_csv(path),
            // CSV is the default
            _ => self.load_csv(path),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::preprocessing::read_numeric_column;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "cars.csv", "wheelbase,fueltype,price\n88.6,gas,13495\n99.8,diesel,16500\n");

        let df = DataLoader::new().load_auto(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("fueltype").unwrap().str().unwrap().get(1), Some("diesel"));
    }

    #[test]
    fn test_load_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "cars.jsonl",
            "{\"wheelbase\": 88.6, \"fueltype\": \"gas\"}\n{\"wheelbase\": 99.8, \"fueltype\": \"diesel\"}\n",
        );

        let df = DataLoader::new().load_auto(&path).unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataLoader::new().load_csv(dir.path().join("absent.csv")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_missing_marker_deep_in_numeric_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("horsepower,fueltype\n");
        for i in 0..150 {
            if i == 120 {
                csv.push_str("?,gas\n");
            } else if i == 130 {
                csv.push_str("NA,diesel\n");
            } else {
                csv.push_str(&format!("{},gas\n", 100 + i));
            }
        }
        let path = write_file(dir.path(), "cars.csv", &csv);

        let df = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(df.height(), 150);

        let horsepower = read_numeric_column(&df, "horsepower", origin!("test")).unwrap();
        assert_eq!(horsepower[0], Some(100.0));
        assert_eq!(horsepower[120], None);
        assert_eq!(horsepower[130], None);
        assert_eq!(horsepower.iter().filter(|v| v.is_none()).count(), 2);
    }
}
