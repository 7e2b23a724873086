//! # flowgraph-checkpoint - step-boundary persistence for flowgraph
//!
//! This crate defines the checkpoint subsystem used by the flowgraph
//! execution engine:
//!
//! - [`Checkpoint`] - an immutable snapshot of a step boundary: state, the
//!   producing node's name, grouping metadata, and a store-assigned version.
//! - [`CheckpointStore`] - the async storage trait backends implement
//!   (`save` / `load` / `list` / `delete` / `clear`).
//! - [`InMemoryCheckpointStore`] - the reference backend for development and
//!   tests.
//!
//! # Grouping and Versioning
//!
//! Checkpoints belonging to one logical execution share a grouping key,
//! resolved from the metadata aliases `execution_id`, `thread_id`,
//! `session_id`, `workflow_id` (first non-empty wins - see
//! [`GROUP_KEY_ALIASES`]). Stores assign each saved checkpoint a version one
//! greater than the group's current maximum, so callers never race on
//! version numbering.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let store = InMemoryCheckpointStore::new();
//!
//! let mut metadata = HashMap::new();
//! metadata.insert("execution_id".to_string(), json!("run-7"));
//!
//! let saved = store
//!     .save(Checkpoint::new("plan", json!({"step": 1}), metadata))
//!     .await?;
//!
//! // Resume later: inspect the group's history in version order.
//! for checkpoint in store.list("run-7").await? {
//!     println!("v{} after '{}'", checkpoint.version, checkpoint.node_name);
//! }
//! ```
//!
//! # Serialization
//!
//! The engine passes state opaquely as [`serde_json::Value`]. Each store
//! documents its own encoding constraint: the in-memory store keeps live
//! values (anything round-trips), JSON-file stores require JSON round-trip,
//! binary backends may accept richer types.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod store;

pub use checkpoint::{group_key, Checkpoint, GROUP_KEY_ALIASES};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use store::CheckpointStore;
