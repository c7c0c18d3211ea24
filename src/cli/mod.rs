//! Command-line interface for training, prediction, and data inspection.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::export::{ArtifactStore, MODEL_KEY, PREPROCESSOR_KEY};
use crate::inference::{PredictionService, RawRecord};
use crate::training::TrainingOrchestrator;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

#[derive(Parser)]
#[command(name = "carprice")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Car price feature pipeline: train, persist, predict")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file (missing fields take their defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Artifact directory (overrides config and CARPRICE_ARTIFACT_DIR)
    #[arg(long, global = true)]
    pub artifact_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit the feature encoder and regressor, then save both artifacts
    Train {
        /// Training table (CSV or JSON)
        #[arg(long)]
        train: PathBuf,

        /// Test table, encoded with the training fit only
        #[arg(long)]
        test: PathBuf,

        /// Artifact format (binary, json)
        #[arg(long)]
        format: Option<String>,

        /// Ridge penalty
        #[arg(long)]
        alpha: Option<f64>,
    },

    /// Predict prices with the saved artifacts
    Predict {
        /// One record as a JSON object, or a path to a JSON file holding one
        #[arg(short, long, conflicts_with = "data", required_unless_present = "data")]
        record: Option<String>,

        /// Table of records (CSV or JSON)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write the table with a `prediction` column to this CSV file
        #[arg(short, long, requires = "data")]
        output: Option<PathBuf>,
    },

    /// Show table information, or artifact metadata without --data
    Info {
        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

/// Resolve configuration: file (or defaults), then environment, then flags.
pub fn resolve_config(config: Option<&Path>, artifact_dir: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let base = match config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let mut config = base.overlay_env()?;
    if let Some(dir) = artifact_dir {
        config.artifact_dir = dir.to_path_buf();
    }
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    mut config: PipelineConfig,
    train: &Path,
    test: &Path,
    format: Option<&str>,
    alpha: Option<f64>,
) -> anyhow::Result<()> {
    section("Train");

    if let Some(format) = format {
        config.format = format.parse()?;
    }
    if let Some(alpha) = alpha {
        config.ridge_alpha = alpha;
    }
    config.validate()?;

    step_run("Fitting encoder and regressor");
    let orchestrator = TrainingOrchestrator::car_price(config);
    let report = orchestrator.train_and_save(train, test)?;
    step_done(&format!("{:.3}s", report.elapsed_secs));

    println!();
    kv("Model", &report.model_name.cyan().to_string());
    kv("Features", &report.n_features.to_string());
    kv("Train rows", &report.train_rows.to_string());
    kv("Test rows", &report.test_rows.to_string());
    kv("Train R²", &format!("{:.4}", report.train_r2));
    kv("Test R²", &format!("{:.4}", report.test_r2).bold().to_string());
    kv("Preprocessor", &report.preprocessor_path.display().to_string());
    kv("Model file", &report.model_path.display().to_string());
    println!();

    Ok(())
}

pub fn cmd_predict(
    config: PipelineConfig,
    record: Option<&str>,
    data: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");
    let service = PredictionService::from_config(&config);

    if let Some(record) = record {
        let json = if Path::new(record).is_file() {
            std::fs::read_to_string(record)?
        } else {
            record.to_string()
        };
        let record: RawRecord = serde_json::from_str(&json)?;
        let price = service.predict(&record)?;
        kv("Prediction", &format!("{:.2}", price).bold().to_string());
    } else if let Some(path) = data {
        step_run("Loading data");
        let start = Instant::now();
        let mut df = DataLoader::new().load_auto(path)?;
        step_done(&format!("{} rows in {:?}", df.height(), start.elapsed()));

        let predictions = service.predict_table(&df)?;
        for (i, p) in predictions.iter().take(10).enumerate() {
            kv(&format!("Row {}", i), &format!("{:.2}", p));
        }
        if predictions.len() > 10 {
            println!("  {}", dim(&format!("... {} more", predictions.len() - 10)));
        }

        if let Some(out) = output {
            df.with_column(Column::new("prediction".into(), predictions))?;
            let mut file = std::fs::File::create(out)?;
            CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
            kv("Written", &out.display().to_string());
        }
    }

    let stats = service.stats();
    kv("Latency", &format!("{:.3} ms", stats.avg_latency_ms));
    println!();
    Ok(())
}

pub fn cmd_info(config: PipelineConfig, data: Option<&Path>) -> anyhow::Result<()> {
    match data {
        Some(path) => data_info(path),
        None => artifact_info(&config),
    }
}

fn data_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_auto(data_path)?;

    kv("File", &data_path.display().to_string());
    kv("Rows", &df.height().to_string());
    kv("Columns", &df.width().to_string());
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

fn artifact_info(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Artifacts");
    let store = ArtifactStore::from_config(config);
    kv("Directory", &store.root().display().to_string());

    for key in [PREPROCESSOR_KEY, MODEL_KEY] {
        println!();
        match store.metadata(key) {
            Ok(meta) => {
                kv("Key", &meta.key.white().bold().to_string());
                kv("Kind", &meta.kind);
                kv("Written by", &meta.crate_version);
                kv("Created", &meta.created_at.to_rfc3339());
                kv("Features", &meta.feature_names.len().to_string());
                for (name, value) in &meta.metrics {
                    kv(name, &format!("{:.4}", value));
                }
            }
            Err(e) => {
                kv("Key", key);
                kv("Status", &e.to_string().yellow().to_string());
            }
        }
    }

    println!();
    Ok(())
}
