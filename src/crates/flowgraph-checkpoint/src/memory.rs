//! In-memory checkpoint store for development and testing
//!
//! [`InMemoryCheckpointStore`] is the reference implementation of
//! [`CheckpointStore`]: a thread-safe map of grouping key to checkpoint
//! history, guarded by a single `RwLock`. Version assignment happens under
//! the write lock, so concurrent saves within a group can never collide.
//!
//! State values are held as live [`serde_json::Value`]s - nothing is encoded,
//! so any value the caller can construct round-trips exactly. Data does not
//! survive process restart; use a persistent backend for that.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let store = InMemoryCheckpointStore::new();
//!
//! let mut metadata = HashMap::new();
//! metadata.insert("thread_id".to_string(), json!("t-1"));
//!
//! let saved = store
//!     .save(Checkpoint::new("step1", json!({"done": true}), metadata))
//!     .await?;
//! assert_eq!(saved.version, 1);
//!
//! let history = store.list("t-1").await?;
//! assert_eq!(history.len(), 1);
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::store::CheckpointStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Grouping key -> checkpoints in insertion order
    groups: HashMap<String, Vec<Checkpoint>>,
    /// Checkpoint id -> owning grouping key
    ids: HashMap<String, String>,
}

/// Thread-safe in-memory [`CheckpointStore`]
///
/// Cloning is cheap and shares the underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of checkpoints across all groups
    pub async fn len(&self) -> usize {
        self.inner.read().await.ids.len()
    }

    /// Whether the store holds no checkpoints
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.ids.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<Checkpoint> {
        let group = checkpoint
            .group_key()
            .ok_or(CheckpointError::MissingGroupKey)?
            .to_string();

        let mut inner = self.inner.write().await;
        let entries = inner.groups.entry(group.clone()).or_default();
        let next_version = entries.iter().map(|c| c.version).max().unwrap_or(0) + 1;

        let mut stored = checkpoint;
        stored.version = next_version;
        entries.push(stored.clone());
        inner.ids.insert(stored.id.clone(), group);
        Ok(stored)
    }

    async fn load(&self, id: &str) -> Result<Option<Checkpoint>> {
        let inner = self.inner.read().await;
        let Some(group) = inner.ids.get(id) else {
            return Ok(None);
        };
        Ok(inner
            .groups
            .get(group)
            .and_then(|entries| entries.iter().find(|c| c.id == id))
            .cloned())
    }

    async fn list(&self, group_id: &str) -> Result<Vec<Checkpoint>> {
        let inner = self.inner.read().await;
        let mut entries = inner.groups.get(group_id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(entries)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let group = inner
            .ids
            .remove(id)
            .ok_or_else(|| CheckpointError::NotFound(id.to_string()))?;
        if let Some(entries) = inner.groups.get_mut(&group) {
            entries.retain(|c| c.id != id);
            if entries.is_empty() {
                inner.groups.remove(&group);
            }
        }
        Ok(())
    }

    async fn clear(&self, group_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(entries) = inner.groups.remove(group_id) {
            for checkpoint in entries {
                inner.ids.remove(&checkpoint.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn thread_metadata(thread: &str) -> HashMap<String, Value> {
        let mut metadata = HashMap::new();
        metadata.insert("thread_id".to_string(), json!(thread));
        metadata
    }

    fn checkpoint(thread: &str, node: &str, state: Value) -> Checkpoint {
        Checkpoint::new(node, state, thread_metadata(thread))
    }

    #[tokio::test]
    async fn test_save_assigns_monotonic_versions() {
        let store = InMemoryCheckpointStore::new();

        let first = store.save(checkpoint("t", "a", json!({}))).await.unwrap();
        let second = store.save(checkpoint("t", "b", json!({}))).await.unwrap();
        let third = store.save(checkpoint("t", "c", json!({}))).await.unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(third.version, 3);
    }

    #[tokio::test]
    async fn test_versions_are_independent_per_group() {
        let store = InMemoryCheckpointStore::new();

        let a1 = store.save(checkpoint("alpha", "n", json!({}))).await.unwrap();
        let b1 = store.save(checkpoint("beta", "n", json!({}))).await.unwrap();
        let a2 = store.save(checkpoint("alpha", "n", json!({}))).await.unwrap();

        assert_eq!(a1.version, 1);
        assert_eq!(b1.version, 1);
        assert_eq!(a2.version, 2);
    }

    #[tokio::test]
    async fn test_save_requires_group_key() {
        let store = InMemoryCheckpointStore::new();
        let orphan = Checkpoint::new("n", json!({}), HashMap::new());

        let err = store.save(orphan).await.unwrap_err();
        assert!(matches!(err, CheckpointError::MissingGroupKey));
    }

    #[tokio::test]
    async fn test_load_round_trips_saved_record() {
        let store = InMemoryCheckpointStore::new();
        let saved = store
            .save(checkpoint("t", "review", json!({"tags": ["x", "y"]})))
            .await
            .unwrap();

        let loaded = store.load(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);

        assert!(store.load("missing-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_ascending_by_version() {
        let store = InMemoryCheckpointStore::new();
        for node in ["a", "b", "c"] {
            store.save(checkpoint("t", node, json!({}))).await.unwrap();
        }

        let history = store.list("t").await.unwrap();
        let versions: Vec<u64> = history.iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(history[0].node_name, "a");
        assert_eq!(history[2].node_name, "c");

        assert!(store.list("unknown-group").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_single_record() {
        let store = InMemoryCheckpointStore::new();
        let first = store.save(checkpoint("t", "a", json!({}))).await.unwrap();
        let second = store.save(checkpoint("t", "b", json!({}))).await.unwrap();

        store.delete(&first.id).await.unwrap();
        assert!(store.load(&first.id).await.unwrap().is_none());
        assert_eq!(store.list("t").await.unwrap(), vec![second]);

        let err = store.delete(&first.id).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clear_removes_whole_group_only() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("gone", "a", json!({}))).await.unwrap();
        store.save(checkpoint("gone", "b", json!({}))).await.unwrap();
        let kept = store.save(checkpoint("kept", "c", json!({}))).await.unwrap();

        store.clear("gone").await.unwrap();
        assert!(store.list("gone").await.unwrap().is_empty());
        assert_eq!(store.list("kept").await.unwrap(), vec![kept]);

        // Clearing an unknown group is a no-op.
        store.clear("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_saves_never_reuse_a_version() {
        let store = InMemoryCheckpointStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save(checkpoint("t", &format!("n{i}"), json!({})))
                    .await
                    .unwrap()
                    .version
            }));
        }

        let mut versions = Vec::new();
        for handle in handles {
            versions.push(handle.await.unwrap());
        }
        versions.sort_unstable();
        assert_eq!(versions, (1..=16).collect::<Vec<u64>>());
    }
}
