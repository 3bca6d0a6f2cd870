use std::path::PathBuf;
use thiserror::Error;

/// Failures of the I/O shell around the engine. The engine itself never
/// fails on bad data; it produces an empty or zero-filled table instead.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid report definition '{name}': {reason}")]
    Definition { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ReportError>;
