//! Error types for `toolforge-generation`.

use thiserror::Error;

/// Failure reported by a schema-synthesis or display-name oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// No oracle is configured for this capability.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle request failed: {0}")]
    Request(String),

    /// The oracle answered, but the answer cannot be used (not JSON, empty name, ...).
    #[error("unusable oracle output: {0}")]
    Unusable(String),
}
