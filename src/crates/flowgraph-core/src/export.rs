//! Exporter - static topology enumeration for diagram generators
//!
//! [`GraphExport`] is a plain-data snapshot of a compiled graph's shape:
//! nodes with their descriptions, static edges, conditional sources, and the
//! entry point. External renderers (mermaid, DOT, whatever else) consume this
//! without touching the engine.
//!
//! Conditional edges are enumerated by source only - their targets are
//! decided by a function at run time and cannot be known statically.
//!
//! # Example
//!
//! ```rust,ignore
//! let export = compiled.export();
//! println!("flowchart TD");
//! for (from, to) in &export.static_edges {
//!     println!("    {from} --> {to}");
//! }
//! for source in &export.conditional_sources {
//!     println!("    {source} -.-> ?");
//! }
//! ```

use serde::{Deserialize, Serialize};

/// One node as seen by the exporter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    /// Unique node name
    pub name: String,
    /// Description given at registration
    pub description: String,
}

/// Static topology of a compiled graph
///
/// All collections are sorted for stable output across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphExport {
    /// Every registered node, sorted by name
    pub nodes: Vec<NodeInfo>,

    /// Every static edge as `(from, to)`, sorted
    pub static_edges: Vec<(String, String)>,

    /// Sources carrying a conditional router, sorted
    pub conditional_sources: Vec<String>,

    /// The graph's entry point
    pub entry_point: String,
}
