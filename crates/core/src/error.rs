use std::path::PathBuf;
use thiserror::Error;

use crate::model::EntityId;

/// Run-scoped failures. File-scoped problems (syntax errors, worker
/// timeouts) are reported as [`crate::model::ParseFailure`] values instead.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index store at {path} is corrupted ({reason}); run a full rebuild")]
    StoreCorruption { path: PathBuf, reason: String },
    #[error("index store at {path} has format version {found}, expected {expected}; run a full rebuild")]
    StoreVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("index store at {0} is locked by another writer")]
    StoreLocked(PathBuf),
    #[error("encoding error: {0}")]
    Encode(String),
    #[error("entity not found: {0}")]
    NotFound(EntityId),
    #[error("file not indexed: {0}")]
    FileNotFound(PathBuf),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Encode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
