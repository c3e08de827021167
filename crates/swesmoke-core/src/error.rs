//! Unified error type for the core library.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = SmokeError> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SmokeError {
    #[error("failed to load dataset {name}: {source}")]
    Dataset { name: String, source: BoxError },

    #[error("invalid prediction: {0}")]
    InvalidPrediction(String),

    #[error("evaluator failed: {0}")]
    Evaluator(String),

    #[error("malformed report {}: {source}", .path.display())]
    Report {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SmokeError {
    pub fn dataset(name: impl Into<String>, err: impl Into<BoxError>) -> Self {
        Self::Dataset {
            name: name.into(),
            source: err.into(),
        }
    }
}
