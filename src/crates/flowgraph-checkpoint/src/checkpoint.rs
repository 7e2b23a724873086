//! Checkpoint records - immutable snapshots of step boundaries
//!
//! A [`Checkpoint`] captures the engine's shared state at the boundary of one
//! execution step, together with the name of the node that produced it and a
//! metadata bag identifying the owning run. Checkpoints enable durability,
//! inspection, and mid-execution resumption.
//!
//! # Grouping
//!
//! Checkpoints are grouped per logical execution. Rather than mandating one
//! identifier convention, the metadata may carry any of four aliases, resolved
//! in priority order (first non-empty wins):
//!
//! 1. `execution_id`
//! 2. `thread_id`
//! 3. `session_id`
//! 4. `workflow_id`
//!
//! Stores use the resolved value as the grouping key for [`list`], [`clear`],
//! and per-group version assignment.
//!
//! [`list`]: crate::store::CheckpointStore::list
//! [`clear`]: crate::store::CheckpointStore::clear
//!
//! # Versioning
//!
//! `version` is a monotonically increasing integer per grouping key. It is
//! always assigned by the store on save - a freshly constructed checkpoint
//! carries version `0` until persisted. The `id` is globally unique.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_checkpoint::Checkpoint;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let mut metadata = HashMap::new();
//! metadata.insert("thread_id".to_string(), json!("session-42"));
//!
//! let checkpoint = Checkpoint::new("review", json!({"draft": "v2"}), metadata);
//! assert_eq!(checkpoint.group_key(), Some("session-42"));
//! assert_eq!(checkpoint.version, 0); // assigned by the store on save
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata aliases accepted as the grouping key, in resolution priority order
pub const GROUP_KEY_ALIASES: [&str; 4] =
    ["execution_id", "thread_id", "session_id", "workflow_id"];

/// Immutable snapshot of a step boundary
///
/// The `state` field is passed through opaquely; serialization constraints
/// (e.g. JSON round-trip for JSON-backed stores) are documented by each store
/// implementation, not imposed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Globally unique identifier
    pub id: String,

    /// Monotonically increasing integer per grouping key, assigned by the
    /// store on save; `0` until persisted
    pub version: u64,

    /// Name of the node whose execution this snapshot follows
    pub node_name: String,

    /// The shared state after the step's merge was applied
    pub state: Value,

    /// String-keyed bag carrying at least one grouping alias plus any
    /// caller-supplied entries
    pub metadata: HashMap<String, Value>,

    /// Creation timestamp, used to break version ties when listing
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a new unsaved checkpoint
    ///
    /// Stamps a fresh UUID and the current time. The version stays `0` until
    /// a store assigns the real per-group value on save.
    pub fn new(
        node_name: impl Into<String>,
        state: Value,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            version: 0,
            node_name: node_name.into(),
            state,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Resolve the grouping key from the metadata
    ///
    /// Returns the value of the first non-empty alias in
    /// [`GROUP_KEY_ALIASES`] order, or `None` when no alias is present.
    pub fn group_key(&self) -> Option<&str> {
        group_key(&self.metadata)
    }
}

/// Resolve the grouping key from a metadata bag
///
/// Shared by stores that need the key before constructing a [`Checkpoint`].
pub fn group_key(metadata: &HashMap<String, Value>) -> Option<&str> {
    GROUP_KEY_ALIASES
        .iter()
        .filter_map(|alias| metadata.get(*alias))
        .filter_map(Value::as_str)
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_new_checkpoint_is_unsaved() {
        let cp = Checkpoint::new("step1", json!({"a": 1}), HashMap::new());
        assert_eq!(cp.version, 0);
        assert_eq!(cp.node_name, "step1");
        assert!(!cp.id.is_empty());
    }

    #[test]
    fn test_group_key_priority_order() {
        let cp = Checkpoint::new(
            "n",
            json!({}),
            metadata(&[("workflow_id", "w"), ("thread_id", "t"), ("execution_id", "e")]),
        );
        assert_eq!(cp.group_key(), Some("e"));

        let cp = Checkpoint::new(
            "n",
            json!({}),
            metadata(&[("workflow_id", "w"), ("session_id", "s")]),
        );
        assert_eq!(cp.group_key(), Some("s"));
    }

    #[test]
    fn test_group_key_skips_empty_values() {
        let cp = Checkpoint::new(
            "n",
            json!({}),
            metadata(&[("execution_id", ""), ("thread_id", "t")]),
        );
        assert_eq!(cp.group_key(), Some("t"));
    }

    #[test]
    fn test_group_key_absent() {
        let cp = Checkpoint::new("n", json!({}), HashMap::new());
        assert_eq!(cp.group_key(), None);
    }

    #[test]
    fn test_checkpoint_json_round_trip() {
        let cp = Checkpoint::new(
            "review",
            json!({"tags": ["a", "b"], "count": 3}),
            metadata(&[("thread_id", "t-1")]),
        );
        let encoded = serde_json::to_string(&cp).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, cp);
    }
}
