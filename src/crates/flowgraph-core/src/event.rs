//! Event and listener layer - step- and node-level progress without coupling
//!
//! Listeners observe a graph's execution: chain start/end, node start,
//! node complete, node error, and step boundaries. They are attached to a
//! compiled graph (shared by all its invocations) and must never mutate the
//! state they are shown.
//!
//! # Delivery guarantees
//!
//! - The registry is copy-on-notify: adding a listener from inside a listener
//!   neither observes nor affects the in-flight notification.
//! - Listeners for one event run in parallel, but the engine waits for all of
//!   them before its next activity, so a listener's own state (say, a
//!   persisted event log) stays consistent with the run.
//! - A panicking listener is caught and logged; it cannot break the engine.
//!
//! # Event kinds
//!
//! The engine emits `ChainStart`, `ChainEnd`, `NodeStart`, `NodeComplete`,
//! `NodeError`, and `Step`. The remaining kinds (`NodeProgress`, `ToolStart`,
//! `ToolEnd`, `LlmStart`, `LlmEnd`, `Token`) are reserved for collaborators
//! that stream through the same pipe.
//!
//! # Streaming
//!
//! [`ChannelListener`] adapts the listener interface to a stream for
//! consumers that want to `.next().await` events instead of implementing a
//! trait:
//!
//! ```rust,ignore
//! use flowgraph_core::event::ChannelListener;
//! use tokio_stream::StreamExt;
//!
//! let (listener, mut events) = ChannelListener::channel();
//! compiled.add_listener(listener);
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.next().await {
//!         println!("[{:?}] {:?}", event.kind, event.node);
//!     }
//! });
//! ```

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// The kinds of events flowing through the listener layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An invocation began
    ChainStart,
    /// An invocation completed
    ChainEnd,
    /// A node is about to execute
    NodeStart,
    /// Reserved for incremental progress from long-running nodes
    NodeProgress,
    /// A node's output was merged into the shared state
    NodeComplete,
    /// A node attempt failed (fires per attempt when retrying)
    NodeError,
    /// A step finished: outputs merged, snapshot taken if configured
    Step,
    /// Reserved for tool adapters
    ToolStart,
    /// Reserved for tool adapters
    ToolEnd,
    /// Reserved for LLM adapters
    LlmStart,
    /// Reserved for LLM adapters
    LlmEnd,
    /// Reserved for token-streaming adapters
    Token,
}

/// One event delivered to listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEvent {
    /// What happened
    pub kind: EventKind,

    /// Identifier of the invocation
    pub run_id: String,

    /// The node involved, when the event is node-scoped
    pub node: Option<String>,

    /// 1-based step index; `0` for chain-scoped events before the first step
    pub step: usize,

    /// State projection: post-merge state for `NodeComplete`/`Step`, final
    /// state for `ChainEnd`, initial state for `ChainStart`. Listeners must
    /// treat this as read-only.
    pub state: Option<Value>,

    /// Error description for `NodeError`
    pub error: Option<String>,
}

impl GraphEvent {
    pub(crate) fn new(kind: EventKind, run_id: impl Into<String>, step: usize) -> Self {
        Self {
            kind,
            run_id: run_id.into(),
            node: None,
            step,
            state: None,
            error: None,
        }
    }

    pub(crate) fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub(crate) fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub(crate) fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Subscriber to step- and node-level events
///
/// Implementations must be `Send + Sync`; one instance may observe many
/// concurrent invocations of the same graph.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Receive one event
    ///
    /// The event's state projection is a snapshot; writing to shared state
    /// from a listener is a contract violation.
    async fn on_node_event(&self, event: &GraphEvent);
}

/// Shared listener collection attached to a compiled graph
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all subsequent notifications
    pub fn add(&self, listener: Arc<dyn Listener>) {
        self.listeners
            .write()
            .expect("listener registry lock poisoned")
            .push(listener);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .expect("listener registry lock poisoned")
            .len()
    }

    /// Whether no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every registered listener of one event
    ///
    /// Snapshots the registry first, fans out in parallel tasks, and awaits
    /// all of them. Panics inside a listener are swallowed with a warning.
    pub async fn notify(&self, event: GraphEvent) {
        let snapshot: Vec<Arc<dyn Listener>> = {
            let guard = self
                .listeners
                .read()
                .expect("listener registry lock poisoned");
            guard.clone()
        };
        if snapshot.is_empty() {
            return;
        }

        let event = Arc::new(event);
        let tasks: Vec<_> = snapshot
            .into_iter()
            .map(|listener| {
                let event = Arc::clone(&event);
                tokio::spawn(async move { listener.on_node_event(event.as_ref()).await })
            })
            .collect();

        for outcome in join_all(tasks).await {
            if let Err(join_error) = outcome {
                tracing::warn!(kind = ?event.kind, error = %join_error, "listener panicked during notification");
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Listener that forwards every event into an unbounded channel
///
/// The sending side never blocks the engine; a dropped receiver simply
/// discards subsequent events.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<GraphEvent>,
}

impl ChannelListener {
    /// Create a listener plus the stream of events it forwards
    pub fn channel() -> (Arc<Self>, UnboundedReceiverStream<GraphEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), UnboundedReceiverStream::new(rx))
    }
}

#[async_trait]
impl Listener for ChannelListener {
    async fn on_node_event(&self, event: &GraphEvent) {
        let _ = self.tx.send(event.clone());
    }
}
