//! Text client errors.

use std::time::Duration;
use thiserror::Error;

use beatreel_models::ErrorKind;

pub type TextResult<T> = Result<T, TextError>;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("Text service not configured")]
    NotConfigured,

    #[error("Invalid text service URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Text service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Text service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Text service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid text service response: {0}")]
    InvalidResponse(String),

    #[error("Text service returned an empty completion")]
    EmptyCompletion,
}

impl TextError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TextError::NotConfigured | TextError::InvalidUrl { .. } => ErrorKind::Validation,
            TextError::Request(_) | TextError::Status { .. } | TextError::Timeout(_) => {
                ErrorKind::Network
            }
            TextError::InvalidResponse(_) | TextError::EmptyCompletion => ErrorKind::Internal,
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TextError::Status { status, .. } => *status >= 500 || *status == 429,
            TextError::Request(e) => e.is_timeout() || e.is_connect(),
            TextError::Timeout(_) => true,
            _ => false,
        }
    }
}
