use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),
    #[error("invalid code length {0}")]
    InvalidLength(usize),
}
