//! Error types for Waypoint.
//!
//! Two layers: [`ToolError`] is the structured, per-invocation error that is
//! handed back to the MCP client; [`WaypointError`] covers process-level
//! failures (configuration, HTTP client construction).

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable classification of a failed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A caller-supplied argument failed validation. No network call was made.
    InvalidInput,
    /// Every upstream attempt ran past the per-attempt time bound.
    UpstreamTimeout,
    /// Connection failure, refused request or an error status from upstream.
    UpstreamUnavailable,
    /// A well-formed response with nothing in it where one match is required.
    NoResults,
    /// Success status, but the payload failed required-field validation.
    UpstreamMalformedResponse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "InvalidInput"),
            ErrorKind::UpstreamTimeout => write!(f, "UpstreamTimeout"),
            ErrorKind::UpstreamUnavailable => write!(f, "UpstreamUnavailable"),
            ErrorKind::NoResults => write!(f, "NoResults"),
            ErrorKind::UpstreamMalformedResponse => write!(f, "UpstreamMalformedResponse"),
        }
    }
}

/// A terminal tool failure. Never retried once it reaches the dispatcher.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn no_results(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoResults, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamMalformedResponse, message)
    }
}

/// Process-level errors.
#[derive(Debug, Error)]
pub enum WaypointError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

pub type Result<T> = std::result::Result<T, WaypointError>;
