//! Error types for every fallible concern in the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Fault raised inside Layers 1-3. The orchestrator converts these (and
/// panics) into a fail-open `Allow` instead of surfacing them to the host.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("input field `{field}` must be a string, got {found}")]
    MalformedField { field: String, found: &'static str },

    #[error("workflow state unavailable: {0}")]
    WorkflowState(#[from] StateStoreError),
}

/// Failures reading or writing the workflow-state document.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("failed to read workflow state at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workflow state at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("workflow state document must be a JSON object")]
    NotAnObject,

    #[error("workflow state has an unexpected shape: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("failed to serialize workflow state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write workflow state at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced while appending metrics records to the sink.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsLogError {
    #[error("failed to serialize metrics record: {0}")]
    Serialize(String),
    #[error("failed to write metrics log: {0}")]
    Io(String),
}

impl From<serde_json::Error> for MetricsLogError {
    fn from(err: serde_json::Error) -> Self {
        MetricsLogError::Serialize(err.to_string())
    }
}

impl From<std::io::Error> for MetricsLogError {
    fn from(err: std::io::Error) -> Self {
        MetricsLogError::Io(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid hookgate configuration: {0}")]
    Invalid(#[from] toml::de::Error),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
