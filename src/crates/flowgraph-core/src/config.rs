//! Invocation configuration and the per-node execution context
//!
//! [`RunConfig`] carries everything a single invocation can customize:
//! observers (callbacks), identity (metadata, tags, configurable bag,
//! run name), limits (timeout, cancellation), and control flow
//! (interrupt_before/after, resume_from, resume_value). A compiled graph is
//! immutable and shared; all per-run variation lives here.
//!
//! [`NodeContext`] is the read-only view handed to every node and conditional
//! function: run identity, the config's bags, the resume value, and the
//! callback dispatcher for collaborators.
//!
//! # Reserved configurable keys
//!
//! The `configurable` bag is opaque to the engine except for four keys -
//! `thread_id`, `session_id`, `execution_id`, `workflow_id` - which are
//! copied into checkpoint metadata so the store can group snapshots by run.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_core::RunConfig;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let config = RunConfig::new()
//!     .with_run_name("nightly-triage")
//!     .with_configurable_entry("thread_id", json!("session-42"))
//!     .with_timeout(Duration::from_secs(300))
//!     .with_interrupt_after(["draft_reply"]);
//!
//! let output = compiled.invoke_with_config(None, config).await?;
//! ```

use crate::callback::{CallbackDispatcher, CallbackHandler};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configurable keys mirrored into checkpoint metadata, in grouping priority
/// order
pub const RESERVED_CONFIGURABLE_KEYS: [&str; 4] =
    ["execution_id", "thread_id", "session_id", "workflow_id"];

/// Per-invocation options
///
/// All fields are optional; `RunConfig::default()` runs the graph from its
/// entry point with no observers and no limits.
#[derive(Clone, Default)]
pub struct RunConfig {
    /// Callback handlers observing this invocation's lifecycles
    pub callbacks: Vec<Arc<dyn CallbackHandler>>,

    /// Opaque bag propagated to callbacks and checkpoint metadata
    pub metadata: HashMap<String, Value>,

    /// Labels propagated to callbacks and events
    pub tags: Vec<String>,

    /// Opaque bag surfaced to nodes; reserved keys are copied to checkpoint
    /// metadata (see [`RESERVED_CONFIGURABLE_KEYS`])
    pub configurable: HashMap<String, Value>,

    /// Human-readable label for the invocation
    pub run_name: Option<String>,

    /// Whole-invocation cap; expiry fails the run with `Timeout`
    pub timeout: Option<Duration>,

    /// Raise `GraphInterrupt` before executing any of these nodes
    pub interrupt_before: Vec<String>,

    /// Snapshot and raise `GraphInterrupt` after any of these nodes completes
    /// (only when further work remains)
    pub interrupt_after: Vec<String>,

    /// Starting frontier overriding the entry point, for resumed runs
    pub resume_from: Vec<String>,

    /// Value surfaced to nodes of a resumed run (see
    /// [`NodeContext::resume_value`])
    pub resume_value: Option<Value>,

    /// Caller cancellation context, honored at step boundaries
    pub cancellation: Option<CancellationToken>,
}

impl RunConfig {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback handler
    pub fn with_callback(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks.push(handler);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a configurable entry
    pub fn with_configurable_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.configurable.insert(key.into(), value);
        self
    }

    /// Set the run name
    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    /// Set the whole-invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the nodes to interrupt before
    pub fn with_interrupt_before<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt_before = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the nodes to interrupt after
    pub fn with_interrupt_after<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt_after = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the resume frontier
    ///
    /// A list, because a fan-out may have been mid-flight at interrupt time;
    /// the caller reconstructs the intended frontier explicitly.
    pub fn with_resume_from<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resume_from = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the value handed back to a previously interrupted node
    pub fn with_resume_value(mut self, value: Value) -> Self {
        self.resume_value = Some(value);
        self
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("callbacks", &self.callbacks.len())
            .field("metadata", &self.metadata)
            .field("tags", &self.tags)
            .field("configurable", &self.configurable)
            .field("run_name", &self.run_name)
            .field("timeout", &self.timeout)
            .field("interrupt_before", &self.interrupt_before)
            .field("interrupt_after", &self.interrupt_after)
            .field("resume_from", &self.resume_from)
            .field("resume_value", &self.resume_value)
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Run-level data shared by every node context of one invocation
#[derive(Debug)]
pub(crate) struct RunScope {
    pub run_id: String,
    pub run_name: Option<String>,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, Value>,
    pub configurable: HashMap<String, Value>,
    pub resume_value: Option<Value>,
    pub callbacks: CallbackDispatcher,
}

/// Read-only execution context handed to node and conditional functions
///
/// Cloning is cheap; the run-level data is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct NodeContext {
    scope: Arc<RunScope>,
    node: String,
    step: usize,
}

impl NodeContext {
    pub(crate) fn new(scope: Arc<RunScope>, node: impl Into<String>, step: usize) -> Self {
        Self {
            scope,
            node: node.into(),
            step,
        }
    }

    /// Unique identifier of this invocation
    pub fn run_id(&self) -> &str {
        &self.scope.run_id
    }

    /// The run name from the invocation config, if any
    pub fn run_name(&self) -> Option<&str> {
        self.scope.run_name.as_deref()
    }

    /// Name of the node this context belongs to
    pub fn node(&self) -> &str {
        &self.node
    }

    /// 1-based index of the current step
    pub fn step(&self) -> usize {
        self.step
    }

    /// Tags from the invocation config
    pub fn tags(&self) -> &[String] {
        &self.scope.tags
    }

    /// Metadata bag from the invocation config
    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.scope.metadata
    }

    /// Look up one configurable entry
    pub fn configurable(&self, key: &str) -> Option<&Value> {
        self.scope.configurable.get(key)
    }

    /// The resume value of a resumed run
    ///
    /// Set when the caller resumes after a `GraphInterrupt` with
    /// `resume_value` in the config. A node that previously interrupted
    /// checks this first and returns a result instead of interrupting again:
    ///
    /// ```rust,ignore
    /// if let Some(answer) = ctx.resume_value() {
    ///     return Ok(NodeOutput::Update(json!({"approved": answer == "yes"})));
    /// }
    /// Err(GraphError::node_interrupt(ctx.node(), json!("need approval?")))
    /// ```
    pub fn resume_value(&self) -> Option<&Value> {
        self.scope.resume_value.as_ref()
    }

    /// Dispatcher for reporting collaborator lifecycles (LLM, tool,
    /// retriever) through the run's callback handlers
    pub fn callbacks(&self) -> &CallbackDispatcher {
        &self.scope.callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_accumulates() {
        let config = RunConfig::new()
            .with_tag("nightly")
            .with_metadata_entry("team", json!("infra"))
            .with_configurable_entry("thread_id", json!("t-1"))
            .with_run_name("triage")
            .with_interrupt_after(["review"])
            .with_resume_from(["step3"]);

        assert_eq!(config.tags, vec!["nightly"]);
        assert_eq!(config.metadata["team"], json!("infra"));
        assert_eq!(config.configurable["thread_id"], json!("t-1"));
        assert_eq!(config.run_name.as_deref(), Some("triage"));
        assert_eq!(config.interrupt_after, vec!["review"]);
        assert_eq!(config.resume_from, vec!["step3"]);
    }

    #[test]
    fn test_node_context_views() {
        let scope = Arc::new(RunScope {
            run_id: "run-1".to_string(),
            run_name: None,
            tags: vec!["t".to_string()],
            metadata: HashMap::new(),
            configurable: [("thread_id".to_string(), json!("x"))].into_iter().collect(),
            resume_value: Some(json!("yes")),
            callbacks: CallbackDispatcher::default(),
        });
        let ctx = NodeContext::new(scope, "review", 2);

        assert_eq!(ctx.run_id(), "run-1");
        assert_eq!(ctx.node(), "review");
        assert_eq!(ctx.step(), 2);
        assert_eq!(ctx.configurable("thread_id"), Some(&json!("x")));
        assert_eq!(ctx.resume_value(), Some(&json!("yes")));
    }
}
