//! Interrupt control signals - suspending a run without failing it
//!
//! A [`GraphInterrupt`] is how the engine tells the caller "the run is paused,
//! here is where and why". It is produced three ways:
//!
//! - a node raised [`GraphError::NodeInterrupt`] (human-in-the-loop input);
//! - a frontier member appeared in `interrupt_before` (pause before work);
//! - a just-executed node appeared in `interrupt_after` (pause after work).
//!
//! Interrupts travel inside a successful
//! [`RunOutput`](crate::engine::RunOutput), never as errors, and they are
//! never retried. The state returned alongside the interrupt is the most
//! recent safe snapshot: pre-step for `interrupt_before`, post-merge for the
//! other two (which also persist a checkpoint when a store is attached).
//!
//! To resume, invoke again with the persisted state, `resume_from` set to the
//! intended frontier, and - for node interrupts - a `resume_value` the
//! interrupted node can pick up instead of interrupting again.
//!
//! [`GraphError::NodeInterrupt`]: crate::error::GraphError::NodeInterrupt

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A suspension signal surfaced to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphInterrupt {
    /// The node the interrupt is attributed to: the raiser for node
    /// interrupts, the matched name for config-driven interrupts
    pub node: String,

    /// Opaque payload: the value a node passed to
    /// [`GraphError::node_interrupt`](crate::error::GraphError::node_interrupt),
    /// or `null` for config-driven interrupts
    pub value: Value,
}

impl GraphInterrupt {
    /// Create an interrupt attributed to `node` carrying `value`
    pub fn new(node: impl Into<String>, value: Value) -> Self {
        Self {
            node: node.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interrupt_round_trips_through_json() {
        let interrupt = GraphInterrupt::new("ask_human", json!("need approval?"));
        let encoded = serde_json::to_string(&interrupt).unwrap();
        let decoded: GraphInterrupt = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, interrupt);
    }
}
