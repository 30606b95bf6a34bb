//! Error types for rendering.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use beatreel_models::{ErrorKind, MediaModelError};

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised while laying out, animating or capturing frames.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Surface initialisation failed: {0}")]
    SurfaceInit(String),

    #[error("Surface did not settle within {0:?}")]
    SettleTimeout(Duration),

    #[error("Surface has no layout loaded")]
    NotLoaded,

    #[error("Failed to load asset {path}: {message}")]
    AssetLoad { path: PathBuf, message: String },

    #[error("Failed to load font {path}: {message}")]
    Font { path: PathBuf, message: String },

    #[error("Failed to capture {path}: {message}")]
    Capture { path: PathBuf, message: String },

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Invalid selector: {0:?}")]
    InvalidSelector(String),

    #[error("Surface pool closed")]
    PoolClosed,

    #[error("Render cancelled")]
    Cancelled,

    #[error(transparent)]
    Sequence(#[from] MediaModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RenderError {
    pub fn surface_init(message: impl Into<String>) -> Self {
        Self::SurfaceInit(message.into())
    }

    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    pub fn capture(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Capture {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Pipeline-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::SurfaceInit(_)
            | RenderError::SettleTimeout(_)
            | RenderError::NotLoaded
            | RenderError::AssetLoad { .. }
            | RenderError::Font { .. }
            | RenderError::Capture { .. }
            | RenderError::PoolClosed => ErrorKind::Render,
            RenderError::InvalidOptions(_) | RenderError::InvalidSelector(_) => {
                ErrorKind::Validation
            }
            RenderError::Cancelled => ErrorKind::Cancelled,
            RenderError::Sequence(_) | RenderError::Io(_) | RenderError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            RenderError::SettleTimeout(Duration::from_millis(10)).kind(),
            ErrorKind::Render
        );
        assert_eq!(
            RenderError::invalid_options("odd width").kind(),
            ErrorKind::Validation
        );
        assert_eq!(RenderError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
