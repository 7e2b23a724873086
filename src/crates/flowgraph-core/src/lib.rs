//! # flowgraph-core - stateful multi-actor graph orchestration
//!
//! Build LLM-driven agent workflows as directed graphs of named nodes over a
//! shared JSON state, and execute them with parallelism, conditional routing,
//! reducer-based fan-in, cycles, interrupts, checkpoint persistence,
//! mid-execution resumption, and event streaming.
//!
//! ## Core Concepts
//!
//! - **[`StateGraph`]** - the imperative builder: add nodes, edges, and
//!   conditional routers, set the entry point, schema, and retry policy,
//!   then compile.
//! - **[`CompiledGraph`]** - the immutable runtime: `invoke` /
//!   `invoke_with_config` drive a frontier-based step loop until the
//!   [`END`] marker is reached or an interrupt suspends the run.
//! - **[`StateSchema`]** - pluggable state merging: a map flavor with
//!   per-key [`Reducer`]s ([`MapSchema`]) and a struct flavor with one
//!   whole-state merger ([`StructSchema`]).
//! - **[`Command`]** - dynamic control: a node can pair its state delta with
//!   a `goto` that overrides the graph's edges.
//! - **[`GraphInterrupt`]** - control-flow suspension, distinct from errors;
//!   paired with the checkpoint layer for durable human-in-the-loop pauses.
//! - **[`Listener`]** / **[`CallbackHandler`]** - observation surfaces for
//!   step/node events and collaborator lifecycles.
//!
//! ## Execution Model
//!
//! ```text
//!             ┌────────────────────────────────────────────┐
//!             │  frontier = {entry point} or resume_from   │
//!             └─────────────────┬──────────────────────────┘
//!                               ▼
//!        ┌─────────────── step loop ────────────────────────┐
//!        │ interrupt_before?  ──────────────▶ GraphInterrupt │
//!        │ execute frontier (parallel, retries, snapshots)   │
//!        │ merge outputs (lexicographic, via schema)         │
//!        │ next frontier: goto > conditional > static edges  │
//!        │ node interrupt / interrupt_after ▶ snapshot+pause │
//!        │ auto-save checkpoint, fire step event             │
//!        └───────────────┬──────────────────────────────────┘
//!                        ▼
//!              frontier empty or END ──▶ chain_end, cleanup
//! ```
//!
//! Within a step every node sees the same pre-step snapshot; sibling writes
//! merge in lexicographic node-name order, so parallel fan-in is
//! deterministic. Across steps, every node of step *k+1* observes every
//! output of step *k*.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowgraph_core::{NodeOutput, StateGraph, END};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut graph = StateGraph::new();
//!
//!     graph.add_node("greet", "say hello", |_ctx, _state| {
//!         Box::pin(async move {
//!             Ok(NodeOutput::update(json!({"greeting": "hello"})))
//!         })
//!     })?;
//!
//!     graph.add_edge("greet", END);
//!     graph.set_entry_point("greet");
//!
//!     let compiled = graph.compile()?;
//!     let output = compiled.invoke(Some(json!({"name": "world"}))).await?;
//!     println!("{}", output.state);
//!     Ok(())
//! }
//! ```
//!
//! ## Checkpointing and Resumption
//!
//! Attach a [`CheckpointStore`](flowgraph_checkpoint::CheckpointStore) and
//! the engine snapshots after every step and before every interrupt. Resume
//! by invoking again with the persisted state, `resume_from` naming the
//! intended frontier, and (after a node interrupt) a `resume_value`:
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::InMemoryCheckpointStore;
//! use flowgraph_core::RunConfig;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryCheckpointStore::new());
//! let compiled = graph.compile()?.with_checkpoint_store(store.clone());
//!
//! let config = RunConfig::new()
//!     .with_configurable_entry("thread_id", json!("session-1"))
//!     .with_interrupt_after(["review"]);
//!
//! let paused = compiled.invoke_with_config(None, config).await?;
//! if paused.is_interrupted() {
//!     let resume = RunConfig::new()
//!         .with_configurable_entry("thread_id", json!("session-1"))
//!         .with_resume_from(["publish"]);
//!     let done = compiled.invoke_with_config(Some(paused.state), resume).await?;
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`builder`] - [`StateGraph`] construction and compile-time validation
//! - [`engine`] - [`CompiledGraph`], the step loop, run outcomes
//! - [`graph`] - node/edge data model and the [`END`] marker
//! - [`state`] - schemas and reducers
//! - [`command`] - dynamic `goto` control
//! - [`config`] - [`RunConfig`] invocation options and [`NodeContext`]
//! - [`retry`] - exponential backoff policies
//! - [`interrupt`] - [`GraphInterrupt`] control signals
//! - [`event`] - listeners, the event stream, [`ChannelListener`]
//! - [`callback`] - collaborator lifecycle handlers
//! - [`export`] - static topology enumeration for diagram generators
//! - [`error`] - the [`GraphError`] taxonomy
//!
//! ## See Also
//!
//! - [`flowgraph_checkpoint`] - checkpoint record, store trait, in-memory
//!   reference store

pub mod builder;
pub mod callback;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod export;
pub mod graph;
pub mod interrupt;
pub mod retry;
pub mod state;

pub use builder::StateGraph;
pub use callback::{CallbackDispatcher, CallbackEvent, CallbackHandler, CallbackPayload};
pub use command::Command;
pub use config::{NodeContext, RunConfig, RESERVED_CONFIGURABLE_KEYS};
pub use engine::{CompiledGraph, RunError, RunOutput, RunStatus};
pub use error::{GraphError, Result};
pub use event::{ChannelListener, EventKind, GraphEvent, Listener, ListenerRegistry};
pub use export::{GraphExport, NodeInfo};
pub use graph::{ConditionalFn, NodeFn, NodeFuture, NodeOutput, NodeSpec, END};
pub use interrupt::GraphInterrupt;
pub use retry::{RetryClassifier, RetryPolicy};
pub use state::{
    AppendReducer, FnReducer, MapSchema, MergeFn, OverwriteReducer, Reducer, StateError,
    StateSchema, StructSchema,
};

// Re-exported so callers don't need a direct tokio-util dependency to cancel
// a run.
pub use tokio_util::sync::CancellationToken;
