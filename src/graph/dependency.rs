//! In-memory API dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{ApiId, ApiNode, CallEdge, EdgeId, Subgraph};

use super::{centrality, cycles};

/// Error type for graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Edge references an endpoint that is not in the graph.
    #[error("Edge {edge_id} references unknown endpoint {missing}")]
    IntegrityViolation {
        /// The rejected edge.
        edge_id: EdgeId,
        /// The endpoint that was not found.
        missing: ApiId,
    },
}

/// Directed graph of API endpoints and the calls between them.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order. Adjacency
/// indices are maintained in lock-step with the edge set, and edges can only
/// be added between nodes that already exist, so no adjacency entry ever
/// points at a missing node.
///
/// Lookups for absent ids return `None` or an empty list; absence is a
/// routine outcome (a caller seen in traffic may not be registered yet).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes by ID.
    nodes: BTreeMap<ApiId, ApiNode>,
    /// Edges by ID.
    edges: BTreeMap<EdgeId, CallEdge>,
    /// Caller -> callees.
    out_neighbors: BTreeMap<ApiId, BTreeSet<ApiId>>,
    /// Callee -> callers.
    in_neighbors: BTreeMap<ApiId, BTreeSet<ApiId>>,
    /// (caller, callee) -> edges joining them.
    pair_edges: BTreeMap<(ApiId, ApiId), BTreeSet<EdgeId>>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any node with the same id.
    ///
    /// Replacing keeps the node's existing edges.
    pub fn add_node(&mut self, node: ApiNode) {
        self.out_neighbors.entry(node.id.clone()).or_default();
        self.in_neighbors.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
    }

    /// Add an edge, replacing any edge with the same id.
    ///
    /// Both endpoints must already be present; otherwise the edge is
    /// rejected with [`GraphError::IntegrityViolation`] and the graph is
    /// left untouched.
    pub fn add_edge(&mut self, edge: CallEdge) -> Result<(), GraphError> {
        for endpoint in [&edge.source_api_id, &edge.target_api_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::IntegrityViolation {
                    edge_id: edge.id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }

        if let Some(previous) = self.edges.remove(&edge.id) {
            self.unlink(&previous);
        }

        self.out_neighbors
            .entry(edge.source_api_id.clone())
            .or_default()
            .insert(edge.target_api_id.clone());
        self.in_neighbors
            .entry(edge.target_api_id.clone())
            .or_default()
            .insert(edge.source_api_id.clone());
        self.pair_edges
            .entry((edge.source_api_id.clone(), edge.target_api_id.clone()))
            .or_default()
            .insert(edge.id.clone());

        self.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    /// Remove a node, its adjacency entries and every edge touching it.
    ///
    /// Returns the removed node, or `None` if it was not present.
    pub fn remove_node(&mut self, id: &ApiId) -> Option<ApiNode> {
        let node = self.nodes.remove(id)?;

        let callees = self.out_neighbors.remove(id).unwrap_or_default();
        let callers = self.in_neighbors.remove(id).unwrap_or_default();

        let touching = callees
            .iter()
            .map(|callee| (id.clone(), callee.clone()))
            .chain(callers.iter().map(|caller| (caller.clone(), id.clone())));
        for pair in touching {
            if let Some(edge_ids) = self.pair_edges.remove(&pair) {
                for edge_id in edge_ids {
                    self.edges.remove(&edge_id);
                }
            }
        }

        for callee in &callees {
            if let Some(set) = self.in_neighbors.get_mut(callee) {
                set.remove(id);
            }
        }
        for caller in &callers {
            if let Some(set) = self.out_neighbors.get_mut(caller) {
                set.remove(id);
            }
        }

        Some(node)
    }

    /// Remove an edge by id.
    ///
    /// The adjacency pair is pruned unless a parallel edge with the same
    /// caller and callee is still present.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<CallEdge> {
        let edge = self.edges.remove(id)?;
        self.unlink(&edge);
        Some(edge)
    }

    fn unlink(&mut self, edge: &CallEdge) {
        let key = (edge.source_api_id.clone(), edge.target_api_id.clone());
        let remaining = match self.pair_edges.get_mut(&key) {
            Some(ids) => {
                ids.remove(&edge.id);
                ids.len()
            }
            None => 0,
        };
        if remaining > 0 {
            return;
        }

        self.pair_edges.remove(&key);
        if let Some(set) = self.out_neighbors.get_mut(&edge.source_api_id) {
            set.remove(&edge.target_api_id);
        }
        if let Some(set) = self.in_neighbors.get_mut(&edge.target_api_id) {
            set.remove(&edge.source_api_id);
        }
    }

    /// Get a node by id.
    pub fn node(&self, id: &ApiId) -> Option<&ApiNode> {
        self.nodes.get(id)
    }

    /// Get an edge by id.
    pub fn edge(&self, id: &EdgeId) -> Option<&CallEdge> {
        self.edges.get(id)
    }

    /// Whether a node with this id exists.
    pub fn contains_node(&self, id: &ApiId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ApiNode> {
        self.nodes.values()
    }

    /// Iterate all edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &CallEdge> {
        self.edges.values()
    }

    /// All node ids in order.
    pub fn node_ids(&self) -> Vec<ApiId> {
        self.nodes.keys().cloned().collect()
    }

    /// Get number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Immediate dependents: the callers of this API (in-neighbors).
    pub fn dependents(&self, id: &ApiId) -> Vec<ApiId> {
        self.dependent_set(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Immediate dependencies: the APIs this one calls (out-neighbors).
    pub fn dependencies(&self, id: &ApiId) -> Vec<ApiId> {
        self.dependency_set(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Callers and callees, deduplicated.
    pub fn neighbors(&self, id: &ApiId) -> Vec<ApiId> {
        let mut all: BTreeSet<&ApiId> = BTreeSet::new();
        all.extend(self.dependency_set(id).into_iter().flatten());
        all.extend(self.dependent_set(id).into_iter().flatten());
        all.into_iter().cloned().collect()
    }

    /// Borrowed in-neighbor set.
    pub fn dependent_set(&self, id: &ApiId) -> Option<&BTreeSet<ApiId>> {
        self.in_neighbors.get(id)
    }

    /// Borrowed out-neighbor set.
    pub fn dependency_set(&self, id: &ApiId) -> Option<&BTreeSet<ApiId>> {
        self.out_neighbors.get(id)
    }

    /// An edge from `source` to `target`, if any.
    ///
    /// With parallel edges the one with the smallest id is returned.
    pub fn edge_between(&self, source: &ApiId, target: &ApiId) -> Option<&CallEdge> {
        self.pair_edges
            .get(&(source.clone(), target.clone()))
            .and_then(|ids| ids.iter().next())
            .and_then(|id| self.edges.get(id))
    }

    /// Nodes in `ids` that exist, and the edges with both endpoints in `ids`.
    pub fn subgraph(&self, ids: &BTreeSet<ApiId>) -> Subgraph {
        let nodes = ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .cloned()
            .collect();
        let edges = self
            .edges
            .values()
            .filter(|e| ids.contains(&e.source_api_id) && ids.contains(&e.target_api_id))
            .cloned()
            .collect();

        Subgraph { nodes, edges }
    }

    /// Nodes owned by a team.
    pub fn nodes_for_team(&self, team_id: &str) -> Vec<&ApiNode> {
        self.nodes.values().filter(|n| n.team_id == team_id).collect()
    }

    /// The subgraph induced by a team's nodes.
    pub fn team_subgraph(&self, team_id: &str) -> Subgraph {
        let ids: BTreeSet<ApiId> = self
            .nodes_for_team(team_id)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        self.subgraph(&ids)
    }

    /// Recompute `in_degree`, `out_degree` and `centrality_score` on every node.
    pub fn compute_centrality(&mut self) {
        let scores = centrality::compute_centrality(self);
        for (id, score) in scores {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.in_degree = score.in_degree;
                node.out_degree = score.out_degree;
                node.centrality_score = score.score;
            }
        }
    }

    /// Detect cycles (see [`cycles::detect_cycles`]).
    pub fn detect_cycles(&self) -> Vec<Vec<ApiId>> {
        cycles::detect_cycles(self)
    }
}
