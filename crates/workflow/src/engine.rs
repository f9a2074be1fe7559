//! Graph executor.
//!
//! `start` installs a fresh checkpoint at the entry step; `resume` continues from the stored
//! cursor, optionally merging an update into the state first. Both run steps one at a time,
//! persisting after every step, until the next step is an interrupt point or the graph ends.

use crate::checkpoint::{Checkpoint, CheckpointStore, Cursor};
use crate::error::{Result, WorkflowError};
use crate::graph::{Graph, Next, StepId};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Upper bound on steps executed by a single `start`/`resume` call.
pub const DEFAULT_STEP_LIMIT: usize = 100;

/// State carried through a graph.
pub trait WorkflowState: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Patch accepted by [`Workflow::resume`].
    type Update: Send;

    fn apply(&mut self, update: Self::Update);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position<S> {
    At(S),
    Terminal,
}

/// Decoded view of a thread's checkpoint.
#[derive(Debug, Clone)]
pub struct Snapshot<S, St> {
    pub thread_id: String,
    pub version: u64,
    pub position: Position<S>,
    pub trail: Vec<S>,
    pub state: St,
}

#[derive(Debug, Clone)]
pub enum RunOutcome<S, St> {
    /// Parked before the interrupt step `at`.
    Suspended { at: S, snapshot: Snapshot<S, St> },
    Completed { snapshot: Snapshot<S, St> },
}

impl<S, St> RunOutcome<S, St> {
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot<S, St> {
        match self {
            RunOutcome::Suspended { snapshot, .. } | RunOutcome::Completed { snapshot } => snapshot,
        }
    }

    #[must_use]
    pub fn into_state(self) -> St {
        match self {
            RunOutcome::Suspended { snapshot, .. } | RunOutcome::Completed { snapshot } => {
                snapshot.state
            }
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

pub struct Workflow<S, St> {
    graph: Arc<Graph<S, St>>,
    store: Arc<dyn CheckpointStore>,
    step_limit: usize,
}

impl<S: StepId, St: WorkflowState> Workflow<S, St> {
    pub fn new(graph: Graph<S, St>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            graph: Arc::new(graph),
            store,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    #[must_use]
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit.max(1);
        self
    }

    #[must_use]
    pub fn graph(&self) -> &Graph<S, St> {
        &self.graph
    }

    /// Begin a new run for `thread_id`, replacing any previous checkpoint of that thread.
    ///
    /// # Errors
    ///
    /// Returns an error if a step fails, routing fails, or a checkpoint cannot be written.
    pub async fn start(&self, thread_id: &str, initial: St) -> Result<RunOutcome<S, St>> {
        tracing::info!(graph = self.graph.name(), thread_id, "starting workflow");
        let snapshot = Snapshot {
            thread_id: thread_id.to_string(),
            version: 0,
            position: Position::At(self.graph.entry()),
            trail: Vec::new(),
            state: initial,
        };
        self.persist(&snapshot).await?;
        self.drive(snapshot, false).await
    }

    /// Continue a thread from its checkpoint.
    ///
    /// Without an update, a thread parked at an interrupt point reports the same suspended
    /// snapshot and nothing is written. A completed thread is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread has no checkpoint, belongs to another graph, a step fails,
    /// or a checkpoint cannot be read or written.
    pub async fn resume(
        &self,
        thread_id: &str,
        update: Option<St::Update>,
    ) -> Result<RunOutcome<S, St>> {
        let mut snapshot = self
            .snapshot(thread_id)
            .await?
            .ok_or_else(|| WorkflowError::UnknownThread(thread_id.to_string()))?;

        let step = match snapshot.position {
            Position::Terminal => {
                if update.is_some() {
                    tracing::warn!(
                        graph = self.graph.name(),
                        thread_id,
                        "ignoring update for completed thread"
                    );
                }
                return Ok(RunOutcome::Completed { snapshot });
            }
            Position::At(step) => step,
        };

        let Some(update) = update else {
            if self.graph.is_interrupt(step) {
                return Ok(RunOutcome::Suspended { at: step, snapshot });
            }
            return self.drive(snapshot, false).await;
        };

        snapshot.state.apply(update);
        snapshot.version += 1;
        self.persist(&snapshot).await?;
        tracing::debug!(
            graph = self.graph.name(),
            thread_id,
            step = step.name(),
            version = snapshot.version,
            "applied update"
        );
        self.drive(snapshot, true).await
    }

    /// Read the current checkpoint of `thread_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails, the checkpoint belongs to another graph, or its
    /// state or cursor cannot be decoded.
    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<Snapshot<S, St>>> {
        let Some(cp) = self.store.load(thread_id).await? else {
            return Ok(None);
        };
        if cp.graph != self.graph.name() {
            return Err(WorkflowError::GraphMismatch {
                thread: thread_id.to_string(),
                expected: self.graph.name().to_string(),
                found: cp.graph,
            });
        }

        let position = match cp.cursor {
            Cursor::Terminal => Position::Terminal,
            Cursor::At(name) => Position::At(decode_step(&name)?),
        };
        let trail = cp
            .trail
            .iter()
            .map(|name| decode_step(name))
            .collect::<Result<Vec<S>>>()?;
        let state = serde_json::from_value(cp.state).map_err(WorkflowError::State)?;

        Ok(Some(Snapshot {
            thread_id: cp.thread_id,
            version: cp.version,
            position,
            trail,
            state,
        }))
    }

    async fn drive(
        &self,
        mut snapshot: Snapshot<S, St>,
        mut past_interrupt: bool,
    ) -> Result<RunOutcome<S, St>> {
        let graph = self.graph.name();
        let mut executed = 0usize;

        loop {
            let Position::At(step) = snapshot.position else {
                return Ok(RunOutcome::Completed { snapshot });
            };
            if self.graph.is_interrupt(step) && !past_interrupt {
                tracing::info!(
                    graph,
                    thread_id = %snapshot.thread_id,
                    step = step.name(),
                    "suspended at interrupt"
                );
                return Ok(RunOutcome::Suspended { at: step, snapshot });
            }
            past_interrupt = false;

            if executed >= self.step_limit {
                return Err(WorkflowError::StepLimit(self.step_limit));
            }
            executed += 1;

            let handler = self
                .graph
                .handler(step)
                .ok_or_else(|| WorkflowError::UnknownStep(step.name().to_string()))?;
            let edge = self
                .graph
                .edge(step)
                .ok_or_else(|| WorkflowError::UnknownStep(step.name().to_string()))?;

            tracing::debug!(graph, thread_id = %snapshot.thread_id, step = step.name(), "running step");
            let state = handler
                .run(snapshot.state.clone())
                .await
                .map_err(|source| {
                    tracing::error!(
                        graph,
                        thread_id = %snapshot.thread_id,
                        step = step.name(),
                        error = %source,
                        "step failed"
                    );
                    WorkflowError::Step {
                        step: step.name(),
                        source,
                    }
                })?;

            let next = edge.resolve(step, &state)?;
            snapshot.state = state;
            snapshot.trail.push(step);
            snapshot.version += 1;
            snapshot.position = match next {
                Next::Step(s) => Position::At(s),
                Next::End => Position::Terminal,
            };
            self.persist(&snapshot).await?;
        }
    }

    async fn persist(&self, snapshot: &Snapshot<S, St>) -> Result<()> {
        let state = serde_json::to_value(&snapshot.state).map_err(WorkflowError::State)?;
        let cp = Checkpoint {
            thread_id: snapshot.thread_id.clone(),
            graph: self.graph.name().to_string(),
            version: snapshot.version,
            cursor: match snapshot.position {
                Position::At(s) => Cursor::At(s.name().to_string()),
                Position::Terminal => Cursor::Terminal,
            },
            trail: snapshot.trail.iter().map(|s| s.name().to_string()).collect(),
            state,
            updated_at: Utc::now(),
        };
        self.store.save(&cp).await?;
        Ok(())
    }
}

fn decode_step<S: StepId>(name: &str) -> Result<S> {
    S::from_name(name).ok_or_else(|| WorkflowError::UnknownStep(name.to_string()))
}
