use cutter_core::{CoreError, StorageError};
use cutter_generator::GeneratorError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("owner id is missing")]
    MissingOwner,
    #[error("batch is empty")]
    EmptyBatch,
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code was deleted: {0}")]
    Gone(String),
    #[error("no free short code after {0} attempts")]
    CodeSpaceExhausted(usize),
    #[error("code generation failed: {0}")]
    Generator(#[from] GeneratorError),
    #[error("storage backend unreachable: {0}")]
    Unavailable(String),
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("deletion queue is full")]
    QueueFull,
    #[error("deletion queue is closed")]
    QueueClosed,
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(code) => Self::NotFound(code),
            StorageError::Unavailable(message) => Self::Unavailable(message),
            other => Self::Storage(other),
        }
    }
}
