//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use beatreel_models::ErrorKind;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while acquiring, probing or composing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("FFprobe timed out after {0:?}")]
    ProbeTimeout(Duration),

    #[error("No audio stream in {0}")]
    NoAudioStream(PathBuf),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Download timed out after {0:?}")]
    DownloadTimeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Pipeline-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::DownloadFailed { .. }
            | MediaError::HttpStatus { .. }
            | MediaError::DownloadTimeout(_)
            | MediaError::Http(_) => ErrorKind::Network,
            MediaError::FfprobeNotFound
            | MediaError::FfprobeFailed { .. }
            | MediaError::ProbeTimeout(_)
            | MediaError::NoAudioStream(_)
            | MediaError::InvalidMedia(_)
            | MediaError::JsonParse(_) => ErrorKind::Probe,
            MediaError::FfmpegNotFound
            | MediaError::FfmpegFailed { .. }
            | MediaError::Timeout(_) => ErrorKind::Composition,
            MediaError::FileNotFound(_) | MediaError::InvalidInput(_) => ErrorKind::Validation,
            MediaError::Cancelled => ErrorKind::Cancelled,
            MediaError::Io(_) | MediaError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MediaError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            other => other.kind() == ErrorKind::Network,
        }
    }
}
