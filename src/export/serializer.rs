//! Artifact serialization
//!
//! Fitted state is written inside an envelope (magic bytes, format version,
//! metadata, payload, checksum). Writes go to a temporary file in the
//! destination directory and are renamed into place, so readers only ever
//! see a complete previous artifact or a complete new one.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::origin;

/// Logical key of the fitted feature encoder
pub const PREPROCESSOR_KEY: &str = "preprocessor";
/// Logical key of the fitted regressor
pub const MODEL_KEY: &str = "model";

/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializationFormat {
    /// Binary format using bincode (efficient)
    Binary,
    /// JSON format (portable, human-readable)
    Json,
}

impl Default for SerializationFormat {
    fn default() -> Self {
        SerializationFormat::Binary
    }
}

impl std::fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationFormat::Binary => write!(f, "binary"),
            SerializationFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "bin" | "bincode" => Ok(SerializationFormat::Binary),
            "json" => Ok(SerializationFormat::Json),
            other => Err(PipelineError::config(
                origin!("serialization_format.parse"),
                format!("unknown serialization format `{}` (expected binary or json)", other),
            )),
        }
    }
}

/// Descriptive metadata stored next to every artifact payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Logical key the artifact was saved under
    pub key: String,
    /// Rust type (or model family) of the payload
    pub kind: String,
    /// Crate version that wrote the artifact
    pub crate_version: String,
    pub created_at: DateTime<Utc>,
    /// Feature names the payload was fitted against
    pub feature_names: Vec<String>,
    pub target_name: Option<String>,
    /// Evaluation metrics recorded at training time
    pub metrics: BTreeMap<String, f64>,
}

impl ArtifactMetadata {
    pub fn new(key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            feature_names: Vec::new(),
            target_name: None,
            metrics: BTreeMap::new(),
        }
    }

    /// Set feature names
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_names = features;
        self
    }

    /// Set target name
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = Some(target.into());
        self
    }

    /// Add metric
    pub fn add_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// On-disk wrapper around a serialized payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u32,
    metadata: ArtifactMetadata,
    payload: Vec<u8>,
    checksum: u64,
}

impl Envelope {
    const MAGIC: [u8; 4] = *b"CPRA";
    const VERSION: u32 = 1;

    fn new(metadata: ArtifactMetadata, payload: Vec<u8>) -> Self {
        let checksum = xxh3_64(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            payload,
            checksum,
        }
    }

    /// Reason the envelope cannot be trusted, if any
    fn defect(&self, key: &str) -> Option<String> {
        if self.magic != Self::MAGIC {
            return Some("bad magic bytes".to_string());
        }
        if self.format_version > Self::VERSION {
            return Some(format!(
                "format version {} is newer than supported version {}",
                self.format_version,
                Self::VERSION
            ));
        }
        if xxh3_64(&self.payload) != self.checksum {
            return Some("payload checksum mismatch".to_string());
        }
        if self.metadata.key != key {
            return Some(format!("envelope holds key `{}`", self.metadata.key));
        }
        None
    }
}

/// Keyed artifact storage rooted at a directory.
///
/// Keys map to file names inside the root; `preprocessor` and `model` take
/// their names from [`PipelineConfig`], any other key uses `<key>.bin` or
/// `<key>.json` depending on the format.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    format: SerializationFormat,
    file_names: HashMap<String, String>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, format: SerializationFormat) -> Self {
        Self {
            root: root.into(),
            format,
            file_names: HashMap::new(),
        }
    }

    /// Store rooted at `config.artifact_dir` with the configured file names
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.artifact_dir, config.format)
            .with_file_name(PREPROCESSOR_KEY, &config.preprocessor_file)
            .with_file_name(MODEL_KEY, &config.model_file)
    }

    /// Builder method to pin the file name used for `key`
    pub fn with_file_name(mut self, key: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.file_names.insert(key.into(), file_name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    /// File path backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        match self.file_names.get(key) {
            Some(name) => self.root.join(name),
            None => {
                let ext = match self.format {
                    SerializationFormat::Binary => "bin",
                    SerializationFormat::Json => "json",
                };
                self.root.join(format!("{}.{}", key, ext))
            }
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Persist `value` under `key`, replacing any previous artifact atomically.
    pub fn save<T: Serialize>(&self, key: &str, value: &T, metadata: ArtifactMetadata) -> Result<PathBuf> {
        let path = self.path_for(key);
        let metadata = ArtifactMetadata {
            key: key.to_string(),
            ..metadata
        };

        let payload = self.encode(key, &path, value)?;
        let envelope = Envelope::new(metadata, payload);
        let bytes = self.encode(key, &path, &envelope)?;

        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(origin!("artifact_store.save"), dir, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());
        let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        if let Err(e) = write_synced(&tmp_path, &bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(PipelineError::io(origin!("artifact_store.save"), &tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(PipelineError::io(origin!("artifact_store.save"), &path, e));
        }

        tracing::info!(key = %key, path = %path.display(), bytes = bytes.len(), format = %self.format, "artifact saved");
        Ok(path)
    }

    /// Reconstruct the value saved under `key`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.load_with_metadata(key).map(|(value, _)| value)
    }

    /// Reconstruct the value saved under `key` together with its metadata.
    pub fn load_with_metadata<T: DeserializeOwned>(&self, key: &str) -> Result<(T, ArtifactMetadata)> {
        let path = self.path_for(key);
        let (envelope, format) = self.read_envelope(key, &path)?;

        let value = decode(format, &envelope.payload).map_err(|reason| {
            PipelineError::artifact_corrupt(origin!("artifact_store.load"), key, &path, reason)
        })?;

        tracing::debug!(key = %key, path = %path.display(), "artifact loaded");
        Ok((value, envelope.metadata))
    }

    /// Metadata of the artifact under `key`, without decoding its payload type
    pub fn metadata(&self, key: &str) -> Result<ArtifactMetadata> {
        let path = self.path_for(key);
        self.read_envelope(key, &path).map(|(envelope, _)| envelope.metadata)
    }

    /// Read and verify the envelope, returning it with the format it was written in
    fn read_envelope(&self, key: &str, path: &Path) -> Result<(Envelope, SerializationFormat)> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::artifact_not_found(origin!("artifact_store.load"), key, path));
            }
            Err(e) => return Err(PipelineError::io(origin!("artifact_store.load"), path, e)),
        };

        let format = detect_format(&bytes);
        let envelope: Envelope = decode(format, &bytes).map_err(|reason| {
            PipelineError::artifact_corrupt(origin!("artifact_store.load"), key, path, reason)
        })?;
        if let Some(reason) = envelope.defect(key) {
            return Err(PipelineError::artifact_corrupt(origin!("artifact_store.load"), key, path, reason));
        }
        Ok((envelope, format))
    }

    fn encode<T: Serialize + ?Sized>(&self, key: &str, path: &Path, value: &T) -> Result<Vec<u8>> {
        let encoded = match self.format {
            SerializationFormat::Binary => bincode::serialize(value).map_err(|e| e.to_string()),
            SerializationFormat::Json => serde_json::to_vec_pretty(value).map_err(|e| e.to_string()),
        };
        encoded.map_err(|e| {
            PipelineError::upstream(
                origin!("artifact_store.save"),
                format!("failed to serialize `{}` for {}: {}", key, path.display(), e),
            )
        })
    }
}

/// Binary envelopes start with the magic bytes; JSON envelopes with `{`.
fn detect_format(bytes: &[u8]) -> SerializationFormat {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => SerializationFormat::Json,
        _ => SerializationFormat::Binary,
    }
}

fn decode<T: DeserializeOwned>(format: SerializationFormat, bytes: &[u8]) -> std::result::Result<T, String> {
    match format {
        SerializationFormat::Binary => {
            bincode::deserialize(bytes).map_err(|e| format!("invalid binary encoding: {}", e))
        }
        SerializationFormat::Json => serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {}", e)),
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Fitted {
        means: Vec<f64>,
        names: Vec<String>,
    }

    fn fitted() -> Fitted {
        Fitted {
            means: vec![94.3, 171.2],
            names: vec!["wheelbase".into(), "carlength".into()],
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<SerializationFormat>().unwrap(), SerializationFormat::Json);
        assert_eq!(" binary ".parse::<SerializationFormat>().unwrap(), SerializationFormat::Binary);
        assert_eq!("yaml".parse::<SerializationFormat>().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_roundtrip_both_formats() {
        for format in [SerializationFormat::Binary, SerializationFormat::Json] {
            let dir = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(dir.path(), format);

            let meta = ArtifactMetadata::new("stats", "Fitted").with_features(fitted().names);
            store.save("stats", &fitted(), meta).unwrap();

            let (loaded, meta): (Fitted, _) = store.load_with_metadata("stats").unwrap();
            assert_eq!(loaded, fitted());
            assert_eq!(meta.key, "stats");
            assert_eq!(meta.crate_version, env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn test_json_floats_reload_bit_identical() {
        use crate::preprocessing::{FeatureEncoder, ImputeStrategy, UnknownCategoryPolicy};
        use crate::schema::Schema;
        use polars::prelude::*;

        let train = df!(
            "wheelbase" => &[88.6, 99.8, 94.5, 96.5, 102.4, 93.7, 97.3],
            "curbweight" => &[2548.0, 2824.0, 2337.0, 2507.0, 3086.0, 1874.0, 2209.0],
            "fueltype" => &["gas", "diesel", "gas", "gas", "diesel", "gas", "gas"],
            "price" => &[13495.0, 16500.0, 13950.0, 17450.0, 18920.0, 6575.0, 9995.0],
        )
        .unwrap();
        let schema = Schema::new(["wheelbase", "curbweight"], ["fueltype"], "price").unwrap();
        let mut encoder = FeatureEncoder::new(schema, ImputeStrategy::Mean, UnknownCategoryPolicy::UnknownBucket);
        let fitted_matrix = encoder.fit_transform(&train).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), SerializationFormat::Json);
        store
            .save(PREPROCESSOR_KEY, &encoder, ArtifactMetadata::new(PREPROCESSOR_KEY, "FeatureEncoder"))
            .unwrap();

        let loaded: FeatureEncoder = store.load(PREPROCESSOR_KEY).unwrap();
        assert_eq!(loaded, encoder);
        let reloaded_matrix = loaded.transform_labeled(&train).unwrap();
        for (a, b) in fitted_matrix.values().iter().zip(reloaded_matrix.values().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }

        let awkward = Fitted {
            means: vec![94.88570044671121, 0.1 + 0.2, 1.0 / 3.0, 2548.123456789012],
            names: vec![],
        };
        store.save("stats", &awkward, ArtifactMetadata::new("stats", "Fitted")).unwrap();
        let back: Fitted = store.load("stats").unwrap();
        for (a, b) in awkward.means.iter().zip(&back.means) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("artifacts");
        let store = ArtifactStore::new(&root, SerializationFormat::Binary);

        let path = store.save("stats", &fitted(), ArtifactMetadata::new("stats", "Fitted")).unwrap();
        assert!(path.is_file());

        let leftovers: Vec<_> = fs::read_dir(&root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_load_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), SerializationFormat::Binary);
        let err = store.load::<Fitted>("stats").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactNotFound);
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), SerializationFormat::Binary);
        fs::write(store.path_for("stats"), b"\x00\x01not an artifact").unwrap();

        let err = store.load::<Fitted>("stats").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactCorrupt);
    }

    #[test]
    fn test_tampered_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), SerializationFormat::Json);
        let path = store.save("stats", &fitted(), ArtifactMetadata::new("stats", "Fitted")).unwrap();

        let mut envelope: Envelope = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        envelope.payload.push(b' ');
        fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

        let err = store.load::<Fitted>("stats").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactCorrupt);
    }

    #[test]
    fn test_key_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), SerializationFormat::Binary)
            .with_file_name("a", "shared.bin")
            .with_file_name("b", "shared.bin");
        store.save("a", &fitted(), ArtifactMetadata::new("a", "Fitted")).unwrap();

        let err = store.load::<Fitted>("b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactCorrupt);
    }

    #[test]
    fn test_save_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), SerializationFormat::Binary);
        store.save("stats", &fitted(), ArtifactMetadata::new("stats", "Fitted")).unwrap();

        let mut updated = fitted();
        updated.means[0] = 1.0;
        store.save("stats", &updated, ArtifactMetadata::new("stats", "Fitted")).unwrap();

        assert_eq!(store.load::<Fitted>("stats").unwrap(), updated);
    }

    #[test]
    fn test_from_config_file_names() {
        let config = PipelineConfig::default().with_artifact_dir("/srv/cars");
        let store = ArtifactStore::from_config(&config);
        assert_eq!(store.path_for(PREPROCESSOR_KEY), PathBuf::from("/srv/cars/preprocessor.bin"));
        assert_eq!(store.path_for(MODEL_KEY), PathBuf::from("/srv/cars/model.bin"));
        assert_eq!(store.path_for("other"), PathBuf::from("/srv/cars/other.bin"));
    }
}
