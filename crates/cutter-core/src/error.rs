use crate::shortcode::ShortCode;
use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors returned by a [`Registry`](crate::Registry) backend.
///
/// `Conflict` is the expected outcome of saving a URL that is already
/// registered. It carries the code the URL is registered under, and callers
/// should treat it as an idempotent success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("url already shortened as {existing}")]
    Conflict { existing: ShortCode },
    #[error("short code already taken: {0}")]
    CodeTaken(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("storage backend unreachable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage io failed: {0}")]
    Io(String),
}

impl StorageError {
    /// Returns the existing short code when this is a dedup conflict.
    pub fn existing_code(&self) -> Option<&ShortCode> {
        match self {
            StorageError::Conflict { existing } => Some(existing),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
