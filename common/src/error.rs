use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Rate limited by generation backend: {0}")]
    RateLimited(String),
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Document processing error: {0}")]
    Processing(String),
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Backend unavailability as opposed to a local or content failure.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Generation(_))
    }
}
