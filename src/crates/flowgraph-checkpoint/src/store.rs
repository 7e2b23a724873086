//! Storage trait for checkpoint backends
//!
//! [`CheckpointStore`] is the seam between the execution engine and any
//! persistence medium. The engine passes state opaquely; each backend decides
//! its own encoding and documents the constraint to callers (a JSON-backed
//! store accepts values that round-trip through JSON, binary backends may
//! accept richer types).
//!
//! # Contract
//!
//! - `save` assigns the checkpoint's `version`: one greater than the highest
//!   existing version within the same grouping key. Stores must serialize
//!   save/list per group at minimum so concurrent saves never reuse a version.
//! - `list` returns a group's checkpoints in ascending `version` order, ties
//!   broken by `created_at`.
//! - Implementations must be safe for concurrent use; one store instance is
//!   shared by every caller that references it.
//!
//! # Implementing a Backend
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, Result};
//! use async_trait::async_trait;
//!
//! struct RedisCheckpointStore { /* connection pool */ }
//!
//! #[async_trait]
//! impl CheckpointStore for RedisCheckpointStore {
//!     async fn save(&self, checkpoint: Checkpoint) -> Result<Checkpoint> {
//!         // resolve group, assign next version under a per-group lock,
//!         // serialize, SET/ZADD, return the stamped record
//!         # unimplemented!()
//!     }
//!     // ... load / list / delete / clear ...
//! }
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;

/// Opaque persistence interface for checkpoints
///
/// See the [module docs](self) for the versioning and ordering contract.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint, assigning its per-group version
    ///
    /// Returns the stored record with `version` filled in. Fails with
    /// [`CheckpointError::MissingGroupKey`] when the metadata carries none of
    /// the grouping aliases.
    ///
    /// [`CheckpointError::MissingGroupKey`]: crate::error::CheckpointError::MissingGroupKey
    async fn save(&self, checkpoint: Checkpoint) -> Result<Checkpoint>;

    /// Fetch a checkpoint by its globally unique id
    async fn load(&self, id: &str) -> Result<Option<Checkpoint>>;

    /// List a group's checkpoints in ascending version order
    ///
    /// Ties (which a conforming `save` never produces, but imported data may)
    /// are broken by `created_at`. An unknown group yields an empty list.
    async fn list(&self, group_id: &str) -> Result<Vec<Checkpoint>>;

    /// Delete a single checkpoint by id
    ///
    /// Fails with [`CheckpointError::NotFound`] when no such id exists.
    ///
    /// [`CheckpointError::NotFound`]: crate::error::CheckpointError::NotFound
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete every checkpoint belonging to a group
    ///
    /// Clearing an unknown group is a no-op.
    async fn clear(&self, group_id: &str) -> Result<()>;
}
