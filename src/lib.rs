//! # apiwatch-graph
//!
//! In-memory dependency graph of API endpoints, built from observed
//! service-to-service calls.
//!
//! The engine answers structural questions about that graph:
//!
//! - Which endpoints call this one, transitively, up to N hops?
//! - Which endpoints does this one depend on?
//! - Where are the dependency cycles?
//! - Which endpoints are most central, and what is the longest chain through them?
//!
//! ## Architecture
//!
//! ```text
//! HTTP handler → GraphService (single-flight lazy load)
//!                    ↓
//!              GraphSource (Postgres or Memory)
//!                    ↓
//!              DependencyGraph → cycles / centrality / traversal / critical path
//! ```
//!
//! ## Determinism
//!
//! - Adjacency and node maps are ordered, so every query over the same graph
//!   returns the same order.
//! - Centrality and cycles are computed once per load and reused.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod graph;
pub mod store;
pub mod graph_service;
pub mod cache;
pub mod export;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    ApiId, ApiNode, CallEdge, CycleReport, EdgeId, FullChain, GraphMetadata, GraphPage,
    GraphStats, SerializedGraph, Subgraph, ThreatLevel, TraversalHit,
};
pub use graph::{
    critical_path, dependency_depth, describe_cycles, detect_cycles, full_chain,
    CentralityScores, DependencyGraph, Direction, GraphError,
};
pub use store::{GraphSource, InMemoryGraphSource};
#[cfg(feature = "postgres")]
pub use store::PostgresGraphSource;
pub use graph_service::{
    GraphService, GraphServiceConfig, GraphServiceError, LoadReport, LoadState, LoadedGraph,
};
pub use cache::{CacheConfig, CacheError, CacheKey, CacheStats, GraphCache, LruGraphCache};
pub use export::{to_csv, to_dot};
