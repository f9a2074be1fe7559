//! Error types for `toolforge-workflow`.

use std::path::PathBuf;
use thiserror::Error;

/// Error returned by a step handler. Aborts the run; the last checkpoint is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The caller supplied unusable input (missing or conflicting sources, unreadable config).
    #[error("Invalid input: {0}")]
    Input(String),

    /// Any other unrecoverable step failure.
    #[error("Step failed: {0}")]
    Failed(String),
}

/// Checkpoint persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Checkpoint IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main error type for graph construction and execution.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The graph table is incomplete or inconsistent.
    #[error("Invalid graph '{graph}': {message}")]
    InvalidGraph { graph: String, message: String },

    #[error("No checkpoint for thread '{0}'")]
    UnknownThread(String),

    #[error("Thread '{thread}' belongs to graph '{found}', not '{expected}'")]
    GraphMismatch {
        thread: String,
        expected: String,
        found: String,
    },

    /// A checkpoint names a step the graph does not declare.
    #[error("Unknown step '{0}' in checkpoint")]
    UnknownStep(String),

    #[error("Step '{step}' routed to undeclared key '{route}'")]
    UnknownRoute { step: &'static str, route: String },

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: StepError,
    },

    #[error("Run exceeded {0} steps without reaching an interrupt or the end")]
    StepLimit(usize),

    #[error("State (de)serialization failed: {0}")]
    State(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// True when the failure came from caller input rather than the engine or a store.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WorkflowError::Step {
                source: StepError::Input(_),
                ..
            }
        )
    }
}

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;
