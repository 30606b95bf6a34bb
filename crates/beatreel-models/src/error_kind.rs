//! Pipeline-wide error classification.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category every stage error maps onto.
///
/// Stage crates keep their own detailed error enums; this is what the
/// executor records against a failed step and what callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Download or connectivity failure (including download timeouts).
    Network,
    /// Media file could not be read or inspected.
    Probe,
    /// Rendering surface failure or settle timeout.
    Render,
    /// Encode/mux subprocess failure.
    Composition,
    /// Missing or invalid input file or parameter.
    Validation,
    /// Operation was cancelled by the caller or by a job timeout.
    Cancelled,
    /// Anything else (I/O on scratch space, serialization).
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Probe => "probe",
            ErrorKind::Render => "render",
            ErrorKind::Composition => "composition",
            ErrorKind::Validation => "validation",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
