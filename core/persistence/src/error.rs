//! FILENAME: core/persistence/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid saved-views document: {0}")]
    InvalidFormat(String),

    #[error("Unsupported saved-views version: {0}")]
    UnsupportedVersion(u64),
}
