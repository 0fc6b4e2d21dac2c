use std::io;

use thiserror::Error;

/// Error type for corpus ingestion, instance generation, and cache failures.
#[derive(Debug, Error)]
pub enum PretrainError {
    #[error(
        "corpus has {documents} document(s); at least 2 are required so random next \
         sentences come from a different document (separate documents with blank lines)"
    )]
    InsufficientData { documents: usize },
    #[error("document index {index} out of range (store holds {len} documents)")]
    NotFound { index: usize, len: usize },
    #[error("document store failure: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("tokenizer failure: {0}")]
    Tokenizer(String),
    #[error("file {path} not found")]
    FileNotFound { path: String },
    #[error("remote file {url} not found")]
    RemoteNotFound { url: String },
    #[error("remote fetch of {url} failed: {reason}")]
    Remote { url: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
