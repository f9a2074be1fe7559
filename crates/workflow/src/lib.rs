//! Checkpointed step-graph executor.
//!
//! Graphs are explicit tables (see [`graph`]); runs are driven by [`Workflow`], which persists a
//! [`Checkpoint`] after every step and parks before interrupt steps until resumed.

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod graph;

pub use checkpoint::{
    Checkpoint, CheckpointStore, Cursor, InMemoryCheckpointStore, JsonDirCheckpointStore,
};
pub use engine::{Position, RunOutcome, Snapshot, Workflow, WorkflowState};
pub use error::{Result, StepError, StoreError, WorkflowError};
pub use fanout::{TaskError, fan_out};
pub use graph::{Edge, FnStep, Graph, GraphBuilder, Next, StepHandler, StepId};
