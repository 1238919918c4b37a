//! Core types for the dependency graph.

pub mod node;
pub mod edge;
pub mod views;

pub use node::{ApiId, ApiNode, ThreatLevel};
pub use edge::{CallEdge, EdgeId};
pub use views::{
    CycleReport, FullChain, GraphMetadata, GraphPage, GraphStats, SerializedGraph, Subgraph,
    TraversalHit,
};
