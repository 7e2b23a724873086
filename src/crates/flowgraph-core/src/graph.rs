//! Core graph data model - nodes, edges, and the terminal marker
//!
//! These are the building blocks [`StateGraph`](crate::builder::StateGraph)
//! accumulates and [`CompiledGraph`](crate::engine::CompiledGraph) executes:
//!
//! - **Nodes** ([`NodeSpec`]): uniquely named async functions
//!   `(context, state) -> update | command`.
//! - **Static edges**: `(from, to)` pairs; a node with several outgoing edges
//!   fans out to all of them.
//! - **Conditional edges** ([`ConditionalFn`]): one router per source node,
//!   selecting the successor from the post-merge state.
//! - **[`END`]**: the reserved terminal marker. Not a node - it cannot be
//!   executed, named, or used as an edge source.

use crate::command::Command;
use crate::config::NodeContext;
use crate::error::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Reserved terminal marker
///
/// Route an edge, conditional result, or `Command::goto` here to finish that
/// branch. Distinct from every valid node name; `add_node` rejects it.
pub const END: &str = "__end__";

/// What a node execution produces
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// A bare state delta; successors come from the graph's edges
    Update(Value),

    /// A [`Command`]: optional delta plus an optional dynamic successor that
    /// overrides the edges
    Command(Command),
}

impl NodeOutput {
    /// Shorthand for a bare state delta
    pub fn update(value: Value) -> Self {
        Self::Update(value)
    }
}

impl From<Command> for NodeOutput {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

/// Boxed future returned by node functions
pub type NodeFuture = BoxFuture<'static, Result<NodeOutput>>;

/// Node function: `(context, state) -> update | command`
///
/// Receives a clone of the pre-step state snapshot - siblings executing in
/// the same step never observe each other's writes - and returns a delta for
/// the schema to merge. Written with an explicit `Box::pin`:
///
/// ```rust,ignore
/// graph.add_node("greet", "adds a greeting", |_ctx, _state| {
///     Box::pin(async move {
///         Ok(NodeOutput::update(json!({"greeting": "hello"})))
///     })
/// })?;
/// ```
pub type NodeFn = Arc<dyn Fn(NodeContext, Value) -> NodeFuture + Send + Sync>;

/// Conditional router: `(context, state) -> successor name`
///
/// Evaluated against the post-merge state of the step that executed the
/// source node. Returns a node name, [`END`], or the empty string to fall
/// through to the source's static edges.
pub type ConditionalFn = Arc<dyn Fn(&NodeContext, &Value) -> String + Send + Sync>;

/// A registered node: name, human-readable description, and function
#[derive(Clone)]
pub struct NodeSpec {
    /// Unique name within the graph
    pub name: String,

    /// Free-form description, surfaced by the exporter
    pub description: String,

    /// The node function
    pub func: NodeFn,
}

impl NodeSpec {
    /// Create a node spec
    pub fn new(name: impl Into<String>, description: impl Into<String>, func: NodeFn) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            func,
        }
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("func", &"<function>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_output_from_command() {
        let output: NodeOutput = Command::new().with_goto("next").into();
        assert!(matches!(output, NodeOutput::Command(_)));
    }

    #[test]
    fn test_node_spec_debug_hides_function() {
        let spec = NodeSpec::new(
            "echo",
            "returns its input",
            Arc::new(|_ctx, state| {
                Box::pin(async move { Ok(NodeOutput::update(state)) })
            }),
        );
        let rendered = format!("{spec:?}");
        assert!(rendered.contains("echo"));
        assert!(rendered.contains("<function>"));
    }
}
