//! StateGraph - the imperative graph builder
//!
//! [`StateGraph`] accumulates nodes, edges, and configuration, then
//! [`compile`](StateGraph::compile)s into an immutable
//! [`CompiledGraph`](crate::engine::CompiledGraph) ready to invoke. Name
//! collisions fail eagerly at `add_node`; dangling edges and a missing entry
//! point surface at compile time.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_core::{NodeOutput, StateGraph, END};
//! use serde_json::json;
//!
//! let mut graph = StateGraph::new();
//! graph.add_node("plan", "draft a plan", |_ctx, _state| {
//!     Box::pin(async move { Ok(NodeOutput::update(json!({"plan": "v1"}))) })
//! })?;
//! graph.add_node("execute", "carry it out", |_ctx, _state| {
//!     Box::pin(async move { Ok(NodeOutput::update(json!({"done": true}))) })
//! })?;
//!
//! graph.add_edge("plan", "execute");
//! graph.add_edge("execute", END);
//! graph.set_entry_point("plan");
//!
//! let compiled = graph.compile()?;
//! let output = compiled.invoke(Some(json!({"goal": "ship"}))).await?;
//! ```

use crate::config::NodeContext;
use crate::engine::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::event::ListenerRegistry;
use crate::graph::{ConditionalFn, NodeFuture, NodeSpec, END};
use crate::retry::RetryPolicy;
use crate::state::{MapSchema, StateSchema};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Builder for executable graphs
///
/// Mutable while building; consumed by [`compile`](Self::compile). The
/// default schema is an overwrite [`MapSchema`] and the default retry policy
/// is [`RetryPolicy::none`].
pub struct StateGraph {
    nodes: HashMap<String, NodeSpec>,
    edges: Vec<(String, String)>,
    conditional: HashMap<String, ConditionalFn>,
    entry_point: Option<String>,
    schema: Option<Arc<dyn StateSchema>>,
    retry_policy: RetryPolicy,
}

impl StateGraph {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            conditional: HashMap::new(),
            entry_point: None,
            schema: None,
            retry_policy: RetryPolicy::none(),
        }
    }

    /// Register a node
    ///
    /// Fails with [`GraphError::DuplicateNode`] when the name is taken and
    /// [`GraphError::InvalidName`] when it is empty or equals [`END`].
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        func: impl Fn(NodeContext, Value) -> NodeFuture + Send + Sync + 'static,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.is_empty() || name == END {
            return Err(GraphError::InvalidName(name));
        }
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        let spec = NodeSpec::new(name.clone(), description, Arc::new(func));
        self.nodes.insert(name, spec);
        Ok(self)
    }

    /// Append a static edge
    ///
    /// `to` may be a node name or [`END`]. Endpoints are validated at
    /// [`compile`](Self::compile); a node with several outgoing edges fans
    /// out to all of them.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Set the conditional router for a source node
    ///
    /// At most one per source - a second call overwrites the first. The
    /// router's non-empty result takes precedence over the source's static
    /// edges; an empty result falls through to them.
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<String>,
        router: impl Fn(&NodeContext, &Value) -> String + Send + Sync + 'static,
    ) -> &mut Self {
        self.conditional.insert(from.into(), Arc::new(router));
        self
    }

    /// Set the node where fresh runs begin (required)
    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry_point = Some(name.into());
        self
    }

    /// Set the state schema
    ///
    /// Defaults to an overwrite [`MapSchema`] treating state as an opaque
    /// map.
    pub fn set_schema(&mut self, schema: Arc<dyn StateSchema>) -> &mut Self {
        self.schema = Some(schema);
        self
    }

    /// Set the retry policy applied to every node execution
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) -> &mut Self {
        self.retry_policy = policy;
        self
    }

    /// Validate and produce an immutable, invokable graph
    ///
    /// Checks that the entry point is set and registered, that every static
    /// edge connects declared nodes (or [`END`]), and that conditional
    /// routers hang off declared sources. Unreachable nodes only warn -
    /// conditional routers and commands can reach nodes static analysis
    /// cannot see.
    pub fn compile(self) -> Result<CompiledGraph> {
        let entry_point = self.entry_point.clone().ok_or(GraphError::EntryPointNotSet)?;
        if !self.nodes.contains_key(&entry_point) {
            return Err(GraphError::InvalidConfig(format!(
                "entry point '{entry_point}' is not a registered node"
            )));
        }

        for (from, to) in &self.edges {
            if from == END {
                return Err(GraphError::InvalidConfig(
                    "END cannot be the source of an edge".to_string(),
                ));
            }
            if !self.nodes.contains_key(from) {
                return Err(GraphError::InvalidConfig(format!(
                    "edge source '{from}' is not a registered node"
                )));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(GraphError::UnknownTarget {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }

        for source in self.conditional.keys() {
            if !self.nodes.contains_key(source) {
                return Err(GraphError::InvalidConfig(format!(
                    "conditional edge source '{source}' is not a registered node"
                )));
            }
        }

        self.warn_unreachable(&entry_point);

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in self.edges {
            edges.entry(from).or_default().push(to);
        }

        Ok(CompiledGraph {
            nodes: self.nodes,
            edges,
            conditional: self.conditional,
            entry_point,
            schema: self
                .schema
                .unwrap_or_else(|| Arc::new(MapSchema::new())),
            retry_policy: self.retry_policy,
            listeners: Arc::new(ListenerRegistry::new()),
            store: None,
            auto_save: true,
        })
    }

    /// Best-effort reachability check over static edges (warn-only)
    ///
    /// A reached node carrying a conditional router may route anywhere, so
    /// the check gives up rather than report false positives.
    fn warn_unreachable(&self, entry_point: &str) {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(entry_point);
        queue.push_back(entry_point);

        while let Some(current) = queue.pop_front() {
            if self.conditional.contains_key(current) {
                return;
            }
            for (from, to) in &self.edges {
                if from == current && to != END && visited.insert(to) {
                    queue.push_back(to);
                }
            }
        }

        let mut unreachable: Vec<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|name| !visited.contains(name))
            .collect();
        if !unreachable.is_empty() {
            unreachable.sort_unstable();
            tracing::warn!(
                nodes = ?unreachable,
                "nodes are not reachable from the entry point via static edges"
            );
        }
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        nodes.sort_unstable();
        let mut conditional: Vec<&str> = self.conditional.keys().map(String::as_str).collect();
        conditional.sort_unstable();
        f.debug_struct("StateGraph")
            .field("nodes", &nodes)
            .field("edges", &self.edges)
            .field("conditional_sources", &conditional)
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeOutput;
    use serde_json::json;

    fn noop(graph: &mut StateGraph, name: &str) {
        graph
            .add_node(name, "", |_ctx, _state| {
                Box::pin(async move { Ok(NodeOutput::update(json!({}))) })
            })
            .unwrap();
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = StateGraph::new();
        noop(&mut graph, "a");
        let err = graph
            .add_node("a", "", |_ctx, _state| {
                Box::pin(async move { Ok(NodeOutput::update(json!({}))) })
            })
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(name) if name == "a"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut graph = StateGraph::new();
        let err = graph
            .add_node("", "", |_ctx, _state| {
                Box::pin(async move { Ok(NodeOutput::update(json!({}))) })
            })
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidName(_)));

        let err = graph
            .add_node(END, "", |_ctx, _state| {
                Box::pin(async move { Ok(NodeOutput::update(json!({}))) })
            })
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidName(_)));
    }

    #[test]
    fn test_compile_requires_entry_point() {
        let mut graph = StateGraph::new();
        noop(&mut graph, "a");
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, GraphError::EntryPointNotSet));
    }

    #[test]
    fn test_compile_rejects_unknown_entry_point() {
        let mut graph = StateGraph::new();
        noop(&mut graph, "a");
        graph.set_entry_point("missing");
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, GraphError::InvalidConfig(_)));
    }

    #[test]
    fn test_compile_rejects_unknown_edge_target() {
        let mut graph = StateGraph::new();
        noop(&mut graph, "a");
        graph.add_edge("a", "ghost");
        graph.set_entry_point("a");
        let err = graph.compile().unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnknownTarget { from, to } if from == "a" && to == "ghost"
        ));
    }

    #[test]
    fn test_compile_rejects_end_as_source() {
        let mut graph = StateGraph::new();
        noop(&mut graph, "a");
        graph.add_edge(END, "a");
        graph.set_entry_point("a");
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, GraphError::InvalidConfig(_)));
    }

    #[test]
    fn test_compile_accepts_valid_graph() {
        let mut graph = StateGraph::new();
        noop(&mut graph, "a");
        noop(&mut graph, "b");
        graph.add_edge("a", "b");
        graph.add_edge("b", END);
        graph.set_entry_point("a");

        let compiled = graph.compile().unwrap();
        let export = compiled.export();
        assert_eq!(export.entry_point, "a");
        assert_eq!(export.static_edges.len(), 2);
    }

    #[test]
    fn test_conditional_edge_last_write_wins() {
        let mut graph = StateGraph::new();
        noop(&mut graph, "a");
        noop(&mut graph, "b");
        graph.add_conditional_edge("a", |_ctx, _state| "b".to_string());
        graph.add_conditional_edge("a", |_ctx, _state| END.to_string());
        graph.set_entry_point("a");

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.export().conditional_sources, vec!["a"]);
    }
}
