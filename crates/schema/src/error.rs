//! Error types for `toolforge-schema`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema is not a well-formed draft-07 document.
    #[error("Invalid parameter schema for tool '{tool}': {message}")]
    Invalid { tool: String, message: String },
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
