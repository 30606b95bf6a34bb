//! Worker error types.

use std::time::Duration;
use thiserror::Error;

use beatreel_models::{ErrorKind, RequestError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("Artist not found: {0}")]
    ArtistNotFound(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Media error: {0}")]
    Media(#[from] beatreel_media::MediaError),

    #[error("Render error: {0}")]
    Render(#[from] beatreel_render::RenderError),

    #[error("Text service error: {0}")]
    Text(#[from] beatreel_text::TextError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn enrichment(msg: impl Into<String>) -> Self {
        Self::Enrichment(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Pipeline-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Request(_)
            | WorkerError::ArtistNotFound(_)
            | WorkerError::Validation(_)
            | WorkerError::ConfigError(_) => ErrorKind::Validation,
            WorkerError::Catalog(_) | WorkerError::Enrichment(_) => ErrorKind::Internal,
            WorkerError::Cancelled | WorkerError::Timeout(_) => ErrorKind::Cancelled,
            WorkerError::Media(e) => e.kind(),
            WorkerError::Render(e) => e.kind(),
            WorkerError::Text(e) => e.kind(),
            WorkerError::Io(_) | WorkerError::Json(_) | WorkerError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the executor's retry policy may re-run the failed step.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Media(e) => e.is_transient(),
            other => other.kind() == ErrorKind::Network,
        }
    }
}
