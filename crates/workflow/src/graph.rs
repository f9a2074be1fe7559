//! Step graphs as explicit tables.
//!
//! A graph is a set of step ids (usually a fieldless enum), one handler per step, and one edge per
//! step. Edges are either a fixed successor or a branch: a plain function of the state that
//! returns a route key, plus a fixed map from route keys to successors. Nothing is registered
//! dynamically after [`GraphBuilder::build`].

use crate::error::{Result, StepError, WorkflowError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{Debug, Write as _};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Identifier of a step. Names are persisted in checkpoints and must be stable.
pub trait StepId: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self>;
}

/// Where control goes after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next<S> {
    Step(S),
    End,
}

impl<S: StepId> Next<S> {
    fn label(self) -> &'static str {
        match self {
            Next::Step(s) => s.name(),
            Next::End => "END",
        }
    }
}

/// Routing function of a branch edge.
pub type Router<St> = fn(&St) -> &'static str;

pub enum Edge<S, St> {
    Goto(Next<S>),
    Branch {
        route: Router<St>,
        targets: BTreeMap<&'static str, Next<S>>,
    },
}

impl<S: StepId, St> Edge<S, St> {
    /// Successor for `state`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::UnknownRoute`] when the router returns a key with no target.
    pub fn resolve(&self, from: S, state: &St) -> Result<Next<S>> {
        match self {
            Edge::Goto(next) => Ok(*next),
            Edge::Branch { route, targets } => {
                let key = route(state);
                targets
                    .get(key)
                    .copied()
                    .ok_or_else(|| WorkflowError::UnknownRoute {
                        step: from.name(),
                        route: key.to_string(),
                    })
            }
        }
    }

    fn targets(&self) -> Vec<Next<S>> {
        match self {
            Edge::Goto(next) => vec![*next],
            Edge::Branch { targets, .. } => targets.values().copied().collect(),
        }
    }
}

/// Work performed by one step. Takes the state by value and returns the updated state.
#[async_trait]
pub trait StepHandler<St>: Send + Sync {
    async fn run(&self, state: St) -> std::result::Result<St, StepError>;
}

/// Adapter turning an async function into a [`StepHandler`].
pub struct FnStep<F>(pub F);

#[async_trait]
impl<St, F, Fut> StepHandler<St> for FnStep<F>
where
    St: Send + 'static,
    F: Fn(St) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<St, StepError>> + Send + 'static,
{
    async fn run(&self, state: St) -> std::result::Result<St, StepError> {
        (self.0)(state).await
    }
}

pub struct Graph<S, St> {
    name: &'static str,
    entry: S,
    order: Vec<S>,
    handlers: HashMap<S, Arc<dyn StepHandler<St>>>,
    edges: HashMap<S, Edge<S, St>>,
    interrupts: HashSet<S>,
}

impl<S: StepId, St> Graph<S, St> {
    #[must_use]
    pub fn builder(name: &'static str, entry: S) -> GraphBuilder<S, St> {
        GraphBuilder {
            name,
            entry,
            order: Vec::new(),
            handlers: HashMap::new(),
            edges: HashMap::new(),
            interrupts: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn entry(&self) -> S {
        self.entry
    }

    /// Steps in declaration order.
    #[must_use]
    pub fn steps(&self) -> &[S] {
        &self.order
    }

    #[must_use]
    pub fn edge(&self, step: S) -> Option<&Edge<S, St>> {
        self.edges.get(&step)
    }

    #[must_use]
    pub fn is_interrupt(&self, step: S) -> bool {
        self.interrupts.contains(&step)
    }

    pub(crate) fn handler(&self, step: S) -> Option<&Arc<dyn StepHandler<St>>> {
        self.handlers.get(&step)
    }

    /// Render the edge table, one step per line.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "graph {} (entry: {})", self.name, self.entry.name());
        for step in &self.order {
            let marker = if self.is_interrupt(*step) {
                " [interrupt]"
            } else {
                ""
            };
            let target = match self.edges.get(step) {
                Some(Edge::Goto(next)) => next.label().to_string(),
                Some(Edge::Branch { targets, .. }) => {
                    let arms: Vec<String> = targets
                        .iter()
                        .map(|(k, v)| format!("{k}: {}", v.label()))
                        .collect();
                    format!("branch({})", arms.join(", "))
                }
                None => "?".to_string(),
            };
            let _ = writeln!(out, "  {}{marker} -> {target}", step.name());
        }
        out
    }
}

pub struct GraphBuilder<S, St> {
    name: &'static str,
    entry: S,
    order: Vec<S>,
    handlers: HashMap<S, Arc<dyn StepHandler<St>>>,
    edges: HashMap<S, Edge<S, St>>,
    interrupts: Vec<S>,
}

impl<S: StepId, St> GraphBuilder<S, St> {
    #[must_use]
    pub fn step(mut self, id: S, handler: impl StepHandler<St> + 'static) -> Self {
        if !self.order.contains(&id) {
            self.order.push(id);
        }
        self.handlers.insert(id, Arc::new(handler));
        self
    }

    #[must_use]
    pub fn edge(mut self, from: S, to: Next<S>) -> Self {
        self.edges.insert(from, Edge::Goto(to));
        self
    }

    #[must_use]
    pub fn branch(
        mut self,
        from: S,
        route: Router<St>,
        targets: impl IntoIterator<Item = (&'static str, Next<S>)>,
    ) -> Self {
        self.edges.insert(
            from,
            Edge::Branch {
                route,
                targets: targets.into_iter().collect(),
            },
        );
        self
    }

    /// Suspend before `step` runs.
    #[must_use]
    pub fn interrupt_before(mut self, step: S) -> Self {
        self.interrupts.push(step);
        self
    }

    /// Validate and freeze the table.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidGraph`] when the entry, an edge source or target, or an
    /// interrupt names a step without a handler, or a step has no outgoing edge.
    pub fn build(self) -> Result<Graph<S, St>> {
        let name = self.name;
        let invalid = |message: String| WorkflowError::InvalidGraph {
            graph: name.to_string(),
            message,
        };

        if !self.handlers.contains_key(&self.entry) {
            return Err(invalid(format!(
                "entry step '{}' has no handler",
                self.entry.name()
            )));
        }
        for step in &self.order {
            let Some(edge) = self.edges.get(step) else {
                return Err(invalid(format!(
                    "step '{}' has no outgoing edge",
                    step.name()
                )));
            };
            for target in edge.targets() {
                if let Next::Step(t) = target
                    && !self.handlers.contains_key(&t)
                {
                    return Err(invalid(format!(
                        "edge '{}' -> '{}' targets an undeclared step",
                        step.name(),
                        t.name()
                    )));
                }
            }
        }
        for from in self.edges.keys() {
            if !self.handlers.contains_key(from) {
                return Err(invalid(format!(
                    "edge from undeclared step '{}'",
                    from.name()
                )));
            }
        }
        for step in &self.interrupts {
            if !self.handlers.contains_key(step) {
                return Err(invalid(format!(
                    "interrupt names undeclared step '{}'",
                    step.name()
                )));
            }
        }

        Ok(Graph {
            name: self.name,
            entry: self.entry,
            order: self.order,
            handlers: self.handlers,
            edges: self.edges,
            interrupts: self.interrupts.into_iter().collect(),
        })
    }
}
