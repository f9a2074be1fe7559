//! Error types for `toolforge-discovery`.

use thiserror::Error;

/// Main error type for discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Neither or both of the file and URL inputs were supplied, or a URL is unusable.
    #[error("Input error: {0}")]
    Input(String),

    /// A file named by a relative `$ref` could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Document parse failures (JSON and YAML both rejected).
    #[error("Failed to parse '{location}': {message}")]
    Parse { location: String, message: String },

    /// `$ref` resolution errors.
    #[error("Reference error: {0}")]
    Reference(String),
}

/// Web fetch failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request to '{url}' timed out")]
    Timeout { url: String },

    #[error("Request to '{url}' failed: {message}")]
    Transport { url: String, message: String },

    /// Non-success status after all retries.
    #[error("'{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::InvalidUrl { .. } => false,
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
