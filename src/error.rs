//! Error types for the car price pipeline
//!
//! Every error records where it was raised (`Origin`) and is logged once at
//! that point. Callers that add context wrap the error with
//! [`PipelineError::context`] so the root cause stays reachable through
//! `source()` and [`PipelineError::kind`].

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Boxed cause for failures coming out of numeric or model code
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Where an error was raised: the logical operation plus source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub operation: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl Origin {
    pub const fn new(operation: &'static str, file: &'static str, line: u32) -> Self {
        Self { operation, file, line }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.operation, self.file, self.line)
    }
}

/// Build an [`Origin`] for the current source location.
#[macro_export]
macro_rules! origin {
    ($operation:expr) => {
        $crate::error::Origin::new($operation, file!(), line!())
    };
}

/// Root category of a [`PipelineError`], independent of context wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SchemaMismatch,
    NotFitted,
    UnknownCategory,
    ArtifactNotFound,
    ArtifactCorrupt,
    UpstreamCompute,
    Io,
    Data,
    Config,
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[{origin}] schema mismatch on column `{column}`: {reason}")]
    SchemaMismatch {
        origin: Origin,
        column: String,
        reason: String,
    },

    #[error("[{origin}] {component} used before it was fitted")]
    NotFitted {
        origin: Origin,
        component: &'static str,
    },

    #[error("[{origin}] unknown category `{value}` in column `{column}`")]
    UnknownCategory {
        origin: Origin,
        column: String,
        value: String,
    },

    #[error("[{origin}] artifact `{key}` not found at {}", .path.display())]
    ArtifactNotFound {
        origin: Origin,
        key: String,
        path: PathBuf,
    },

    #[error("[{origin}] artifact `{key}` at {} is corrupt: {reason}", .path.display())]
    ArtifactCorrupt {
        origin: Origin,
        key: String,
        path: PathBuf,
        reason: String,
    },

    #[error("[{origin}] computation failed: {detail}")]
    UpstreamCompute {
        origin: Origin,
        detail: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("[{origin}] I/O error on {}", .path.display())]
    Io {
        origin: Origin,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{origin}] data error: {detail}")]
    Data {
        origin: Origin,
        detail: String,
        #[source]
        source: Option<polars::error::PolarsError>,
    },

    #[error("[{origin}] configuration error: {detail}")]
    Config { origin: Origin, detail: String },

    #[error("{operation}: {detail}")]
    Context {
        operation: &'static str,
        detail: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn schema_mismatch(origin: Origin, column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            origin,
            column: column.into(),
            reason: reason.into(),
        }
        .logged()
    }

    pub fn not_fitted(origin: Origin, component: &'static str) -> Self {
        Self::NotFitted { origin, component }.logged()
    }

    pub fn unknown_category(origin: Origin, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownCategory {
            origin,
            column: column.into(),
            value: value.into(),
        }
        .logged()
    }

    pub fn artifact_not_found(origin: Origin, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ArtifactNotFound {
            origin,
            key: key.into(),
            path: path.into(),
        }
        .logged()
    }

    pub fn artifact_corrupt(
        origin: Origin,
        key: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ArtifactCorrupt {
            origin,
            key: key.into(),
            path: path.into(),
            reason: reason.into(),
        }
        .logged()
    }

    pub fn upstream(origin: Origin, detail: impl Into<String>) -> Self {
        Self::UpstreamCompute {
            origin,
            detail: detail.into(),
            source: None,
        }
        .logged()
    }

    pub fn upstream_with_source(origin: Origin, detail: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        Self::UpstreamCompute {
            origin,
            detail: detail.into(),
            source: Some(source.into()),
        }
        .logged()
    }

    pub fn io(origin: Origin, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            origin,
            path: path.into(),
            source,
        }
        .logged()
    }

    pub fn data(origin: Origin, source: polars::error::PolarsError) -> Self {
        Self::Data {
            origin,
            detail: source.to_string(),
            source: Some(source),
        }
        .logged()
    }

    pub fn data_msg(origin: Origin, detail: impl Into<String>) -> Self {
        Self::Data {
            origin,
            detail: detail.into(),
            source: None,
        }
        .logged()
    }

    pub fn config(origin: Origin, detail: impl Into<String>) -> Self {
        Self::Config {
            origin,
            detail: detail.into(),
        }
        .logged()
    }

    /// Wrap this error with the operation that observed it.
    pub fn context(self, operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Context {
            operation,
            detail: detail.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::NotFitted { .. } => ErrorKind::NotFitted,
            Self::UnknownCategory { .. } => ErrorKind::UnknownCategory,
            Self::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            Self::ArtifactCorrupt { .. } => ErrorKind::ArtifactCorrupt,
            Self::UpstreamCompute { .. } => ErrorKind::UpstreamCompute,
            Self::Io { .. } => ErrorKind::Io,
            Self::Data { .. } => ErrorKind::Data,
            Self::Config { .. } => ErrorKind::Config,
            Self::Context { .. } => unreachable!("root() never returns a context wrapper"),
        }
    }

    /// Origin of the root error.
    pub fn origin(&self) -> Option<Origin> {
        match self.root() {
            Self::SchemaMismatch { origin, .. }
            | Self::NotFitted { origin, .. }
            | Self::UnknownCategory { origin, .. }
            | Self::ArtifactNotFound { origin, .. }
            | Self::ArtifactCorrupt { origin, .. }
            | Self::UpstreamCompute { origin, .. }
            | Self::Io { origin, .. }
            | Self::Data { origin, .. }
            | Self::Config { origin, .. } => Some(*origin),
            Self::Context { .. } => None,
        }
    }

    fn logged(self) -> Self {
        if let Some(origin) = self.origin() {
            tracing::error!(
                operation = origin.operation,
                file = origin.file,
                line = origin.line,
                error = %self,
                "pipeline error"
            );
        }
        self
    }
}

/// Adds operation context to a failing [`Result`].
pub trait ResultExt<T> {
    fn context(self, operation: &'static str, detail: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, operation: &'static str, detail: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(operation, detail))
    }
}
