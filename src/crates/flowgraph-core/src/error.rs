//! Error taxonomy for graph construction and execution
//!
//! All failures surface through [`GraphError`]. Three families matter to
//! callers:
//!
//! - **Validation errors** (`DuplicateNode`, `InvalidName`, `InvalidConfig`,
//!   `EntryPointNotSet`, `UnknownTarget`) - raised at build or compile time,
//!   before any state changes or listener notifications.
//! - **Runtime errors** (`NodeError`, `ReducerError`, `Checkpoint`,
//!   `Timeout`, `Canceled`) - terminal for the invocation; the caller
//!   receives them inside [`RunError`](crate::engine::RunError) alongside the
//!   last safe state.
//! - **Control signals** (`NodeInterrupt`) - not failures. A node raises
//!   `NodeInterrupt` to suspend the run; the engine wraps it into a
//!   [`GraphInterrupt`](crate::interrupt::GraphInterrupt) and returns it as a
//!   successful, resumable outcome. Retry policies never retry interrupts.
//!
//! # Example
//!
//! ```rust,ignore
//! match compiled.invoke(None).await {
//!     Ok(output) if output.is_interrupted() => { /* persist, ask the human, resume */ }
//!     Ok(output) => println!("done: {}", output.state),
//!     Err(failure) => match failure.error {
//!         GraphError::Timeout { duration_ms } => eprintln!("gave up after {duration_ms}ms"),
//!         other => eprintln!("run failed: {other}"),
//!     },
//! }
//! ```

use crate::state::StateError;
use flowgraph_checkpoint::CheckpointError;
use serde_json::Value;
use thiserror::Error;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// All errors and control signals produced by flowgraph
#[derive(Error, Debug)]
pub enum GraphError {
    /// A node with this name is already registered
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),

    /// Node names must be non-empty and distinct from the terminal marker
    #[error("invalid node name '{0}': names must be non-empty and must not equal the END marker")]
    InvalidName(String),

    /// Graph or invocation configuration is inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `compile()` was called before `set_entry_point`
    #[error("entry point not set")]
    EntryPointNotSet,

    /// An edge or dynamic route names a node that does not exist
    #[error("edge from '{from}' references unknown target '{to}'")]
    UnknownTarget {
        /// Source node of the offending edge or route
        from: String,
        /// The undeclared target
        to: String,
    },

    /// A node function failed after exhausting its retry budget
    #[error("node '{node}' execution failed: {message}")]
    NodeError {
        /// Name of the failed node
        node: String,
        /// Error message from the node function
        message: String,
    },

    /// A node's output could not be merged into the shared state
    ///
    /// Treated like a failure of the producing node: the step aborts and the
    /// run's last safe state is the pre-step state.
    #[error("failed to merge output of node '{node}': {source}")]
    ReducerError {
        /// Node whose output could not be merged
        node: String,
        /// Underlying schema failure
        #[source]
        source: StateError,
    },

    /// Persisting a checkpoint failed
    ///
    /// Fails the run by default; the snapshot policy is described in the
    /// engine docs.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The whole-invocation timeout expired
    #[error("invocation timed out after {duration_ms}ms")]
    Timeout {
        /// The configured cap, in milliseconds
        duration_ms: u64,
    },

    /// The caller's cancellation token fired
    #[error("invocation canceled")]
    Canceled,

    /// Control signal: a node requests suspension of the run
    ///
    /// Raise via [`GraphError::node_interrupt`]. The engine snapshots the
    /// post-merge state and returns a
    /// [`GraphInterrupt`](crate::interrupt::GraphInterrupt) wrapping `value`
    /// to the caller. Never subject to retries.
    #[error("node '{node}' requested an interrupt")]
    NodeInterrupt {
        /// Name of the interrupting node
        node: String,
        /// Opaque payload surfaced to the caller (e.g. a question for a human)
        value: Value,
    },
}

impl GraphError {
    /// Create a node execution error with context
    pub fn node_error(node: impl Into<String>, message: impl ToString) -> Self {
        Self::NodeError {
            node: node.into(),
            message: message.to_string(),
        }
    }

    /// Create a node interrupt control signal
    ///
    /// Typically raised from inside a node function with the node's own name
    /// taken from the context:
    ///
    /// ```rust,ignore
    /// return Err(GraphError::node_interrupt(ctx.node(), json!("need approval?")));
    /// ```
    pub fn node_interrupt(node: impl Into<String>, value: Value) -> Self {
        Self::NodeInterrupt {
            node: node.into(),
            value,
        }
    }

    /// Whether this is the `NodeInterrupt` control signal rather than a failure
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::NodeInterrupt { .. })
    }
}
