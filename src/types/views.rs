//! Read-only result shapes returned by graph queries.
//!
//! Everything here is plain owned data: callers get snapshots and never
//! touch the graph itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::edge::CallEdge;
use super::node::{ApiId, ApiNode};

/// Nodes filtered to an id set, with the edges fully inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    /// Nodes in the requested set that exist in the graph.
    pub nodes: Vec<ApiNode>,
    /// Edges whose source and target are both in the set.
    pub edges: Vec<CallEdge>,
}

/// One node reached by a bounded breadth-first traversal.
///
/// Traffic fields come from the edge joining the node to the neighbor that
/// discovered it, or are zero when no such edge exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalHit {
    /// The reached node.
    pub node_id: ApiId,
    /// Hop distance from the seed (seed is depth 0 and never reported).
    pub depth: u32,
    /// Calls on the discovering edge.
    pub call_count: u64,
    /// Average latency on the discovering edge.
    pub avg_latency_ms: f64,
    /// Error rate on the discovering edge.
    pub error_rate: f64,
}

/// Every transitive caller and callee of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullChain {
    /// All upstream callers, any depth.
    pub upstream: Vec<ApiId>,
    /// All downstream dependencies, any depth.
    pub downstream: Vec<ApiId>,
}

/// Headline counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of edges.
    pub edge_count: usize,
    /// Number of detected cycles.
    pub cycle_count: usize,
}

/// Metadata attached to a serialized graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of edges.
    pub edge_count: usize,
    /// Number of detected cycles.
    pub cycle_count: usize,
    /// When this serialization was produced.
    pub computed_at: DateTime<Utc>,
}

/// Whole-graph transport form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// All nodes.
    pub nodes: Vec<ApiNode>,
    /// All edges.
    pub edges: Vec<CallEdge>,
    /// Counts and timestamp.
    pub metadata: GraphMetadata,
}

impl SerializedGraph {
    /// Build a serialized graph, deriving counts from the collections.
    pub fn new(nodes: Vec<ApiNode>, edges: Vec<CallEdge>, cycle_count: usize) -> Self {
        let metadata = GraphMetadata {
            node_count: nodes.len(),
            edge_count: edges.len(),
            cycle_count,
            computed_at: Utc::now(),
        };
        Self { nodes, edges, metadata }
    }
}

/// One page of the centrality-ordered node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPage {
    /// Nodes on this page, highest centrality first.
    pub nodes: Vec<ApiNode>,
    /// All edges (edges are not paginated).
    pub edges: Vec<CallEdge>,
    /// Metadata of the whole graph.
    pub metadata: GraphMetadata,
    /// Id to pass as `cursor` for the next page.
    pub next_cursor: Option<ApiId>,
}

/// Detected cycles plus human-readable descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Each cycle as node ids in discovery order.
    pub cycles: Vec<Vec<ApiId>>,
    /// `A → B → A` style descriptions, aligned with `cycles`.
    pub descriptions: Vec<String>,
}
