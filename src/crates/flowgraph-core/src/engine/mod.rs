//! Execution engine - the compiled graph and its step loop
//!
//! A [`CompiledGraph`] is the immutable product of
//! [`StateGraph::compile`](crate::builder::StateGraph::compile): node table,
//! edge tables, schema, and retry policy are frozen, so one compiled graph
//! can serve many concurrent invocations, each with independent state.
//!
//! # The step loop
//!
//! Execution is frontier-based. Each step:
//!
//! 1. drops [`END`](crate::graph::END) from the frontier and stops when
//!    nothing remains;
//! 2. raises `GraphInterrupt` if any frontier member is in
//!    `interrupt_before` (pre-step state, no snapshot);
//! 3. executes the frontier - in parallel tasks when it has more than one
//!    member, in-task otherwise - against a shared pre-step snapshot, with
//!    the graph's retry policy around every node;
//! 4. merges the outputs through the schema in lexicographic node-name
//!    order;
//! 5. derives the next frontier: `Command::goto` wins, then a non-empty
//!    conditional result, then static edges;
//! 6. handles node interrupts and `interrupt_after` (snapshot first, then
//!    suspend);
//! 7. auto-saves a checkpoint when a store is attached, then fires the
//!    `step` event.
//!
//! Cycles are allowed; nothing bounds iteration except the configured
//! timeout. A caller wanting a safety cap routes to `END` from a conditional
//! edge once a counter in the state exceeds its limit.
//!
//! # Outcomes
//!
//! `invoke` returns `Result<RunOutput, RunError>`:
//!
//! - `Ok` with [`RunStatus::Completed`] - the frontier drained; `state` is
//!   final (after schema cleanup).
//! - `Ok` with [`RunStatus::Interrupted`] - a control-flow suspension;
//!   `state` is the most recent safe snapshot and the run can be resumed
//!   with `resume_from` / `resume_value`.
//! - `Err(RunError)` - terminal failure; carries the last safe state
//!   alongside the error (pre-step state for node and reducer failures).

mod execution;

use crate::error::GraphError;
use crate::event::{Listener, ListenerRegistry};
use crate::export::{GraphExport, NodeInfo};
use crate::graph::{ConditionalFn, NodeSpec};
use crate::interrupt::GraphInterrupt;
use crate::retry::RetryPolicy;
use crate::state::StateSchema;
use flowgraph_checkpoint::CheckpointStore;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// An immutable, invokable graph
///
/// Safe to share (`Arc`) across tasks; every invocation gets its own state.
/// The listener registry is the one shared mutable surface - listeners added
/// here observe all subsequent invocations.
pub struct CompiledGraph {
    pub(crate) nodes: HashMap<String, NodeSpec>,
    pub(crate) edges: HashMap<String, Vec<String>>,
    pub(crate) conditional: HashMap<String, ConditionalFn>,
    pub(crate) entry_point: String,
    pub(crate) schema: Arc<dyn StateSchema>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) store: Option<Arc<dyn CheckpointStore>>,
    pub(crate) auto_save: bool,
}

impl CompiledGraph {
    /// Attach a checkpoint store
    ///
    /// With a store attached the engine snapshots after every successful step
    /// (auto-save) and before raising config- or node-driven interrupts. A
    /// failing save fails the run with
    /// [`GraphError::Checkpoint`](crate::error::GraphError::Checkpoint).
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable or disable per-step auto-save (default: enabled)
    ///
    /// When disabled, the attached store is still used for interrupt
    /// snapshots.
    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    /// Register a listener for all subsequent invocations
    ///
    /// The registry is copy-on-notify; adding a listener mid-run affects only
    /// notifications that start after the addition.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.listeners.add(listener);
    }

    /// The node where fresh runs begin
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Enumerate the static topology for external diagram generators
    pub fn export(&self) -> GraphExport {
        let mut nodes: Vec<NodeInfo> = self
            .nodes
            .values()
            .map(|spec| NodeInfo {
                name: spec.name.clone(),
                description: spec.description.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut static_edges: Vec<(String, String)> = self
            .edges
            .iter()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |to| (from.clone(), to.clone()))
            })
            .collect();
        static_edges.sort();

        let mut conditional_sources: Vec<String> = self.conditional.keys().cloned().collect();
        conditional_sources.sort();

        GraphExport {
            nodes,
            static_edges,
            conditional_sources,
            entry_point: self.entry_point.clone(),
        }
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        nodes.sort_unstable();
        f.debug_struct("CompiledGraph")
            .field("nodes", &nodes)
            .field("entry_point", &self.entry_point)
            .field("auto_save", &self.auto_save)
            .field("store", &self.store.is_some())
            .finish()
    }
}

/// How a successful invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// The frontier drained normally
    Completed,

    /// The run is suspended and resumable; see
    /// [`GraphInterrupt`](crate::interrupt::GraphInterrupt)
    Interrupted(GraphInterrupt),
}

/// The result of a successful (completed or suspended) invocation
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Final state for completed runs; the most recent safe snapshot for
    /// interrupted ones
    pub state: Value,

    /// Completion or suspension marker
    pub status: RunStatus,
}

impl RunOutput {
    /// The interrupt, when this run was suspended
    pub fn interrupt(&self) -> Option<&GraphInterrupt> {
        match &self.status {
            RunStatus::Interrupted(interrupt) => Some(interrupt),
            RunStatus::Completed => None,
        }
    }

    /// Whether this run was suspended rather than completed
    pub fn is_interrupted(&self) -> bool {
        matches!(self.status, RunStatus::Interrupted(_))
    }
}

/// A failed invocation: the terminal error plus the last safe state
///
/// For node and reducer failures the state is the pre-step state of the
/// failed step; for checkpoint failures it is the step's post-merge state.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RunError {
    /// Last safe state at the time of failure
    pub state: Value,

    /// What went wrong
    pub error: GraphError,
}
