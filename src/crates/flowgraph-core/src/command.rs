//! Commands - dynamic control flow from inside a node
//!
//! A node normally returns a bare state delta and lets the graph's edges pick
//! its successors. Returning a [`Command`] instead lets the node combine a
//! state update with a dynamically chosen `goto` target, overriding both
//! static and conditional edges for that execution of that node.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_core::{Command, NodeOutput, END};
//! use serde_json::json;
//!
//! // Route on a value computed inside the node itself.
//! let output = if score > 5 {
//!     Command::new().with_update(json!({"status": "high"})).with_goto("escalate")
//! } else {
//!     Command::new().with_update(json!({"status": "normal"})).with_goto(END)
//! };
//! Ok(NodeOutput::Command(output))
//! ```

use crate::graph::END;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node-return variant combining a state delta with a dynamic successor
///
/// Both fields are optional: a command with only `update` behaves like a bare
/// delta (edge-derived successors), a command with only `goto` routes without
/// touching state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Command {
    /// State delta contributed to the step's merge pool
    pub update: Option<Value>,

    /// Dynamically chosen successor (a node name or [`END`]); overrides
    /// static and conditional edges for this execution
    pub goto: Option<String>,
}

impl Command {
    /// Create an empty command
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state delta
    pub fn with_update(mut self, update: Value) -> Self {
        self.update = Some(update);
        self
    }

    /// Set the dynamic successor
    pub fn with_goto(mut self, goto: impl Into<String>) -> Self {
        self.goto = Some(goto.into());
        self
    }

    /// Shorthand for a command that routes straight to [`END`]
    pub fn end() -> Self {
        Self::new().with_goto(END)
    }
}
