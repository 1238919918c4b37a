//! Breadth-first traversal over callers and callees.

use std::collections::{HashSet, VecDeque};

use crate::types::{ApiId, FullChain, TraversalHit};

use super::DependencyGraph;

/// Which way to walk the call edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards callers (in-neighbors).
    Upstream,
    /// Towards callees (out-neighbors).
    Downstream,
}

/// Callers of `id` up to `max_depth` hops, each reported once.
pub fn dependents_bfs(graph: &DependencyGraph, id: &ApiId, max_depth: u32) -> Vec<TraversalHit> {
    bounded_bfs(graph, id, max_depth, Direction::Upstream)
}

/// Callees of `id` up to `max_depth` hops, each reported once.
pub fn dependencies_bfs(graph: &DependencyGraph, id: &ApiId, max_depth: u32) -> Vec<TraversalHit> {
    bounded_bfs(graph, id, max_depth, Direction::Downstream)
}

/// Bounded BFS from `seed`.
///
/// The seed sits at depth 0 and is never reported. A global visited set
/// keeps every node to one hit at its shortest distance. Traffic fields come
/// from the edge between the hit and the node that discovered it.
pub fn bounded_bfs(
    graph: &DependencyGraph,
    seed: &ApiId,
    max_depth: u32,
    direction: Direction,
) -> Vec<TraversalHit> {
    let mut hits = Vec::new();
    let mut visited: HashSet<&ApiId> = HashSet::new();
    let mut queue: VecDeque<(&ApiId, u32)> = VecDeque::new();

    visited.insert(seed);
    queue.push_back((seed, 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for neighbor in step(graph, current, direction).into_iter().flatten() {
            if !visited.insert(neighbor) {
                continue;
            }

            let edge = match direction {
                Direction::Upstream => graph.edge_between(neighbor, current),
                Direction::Downstream => graph.edge_between(current, neighbor),
            };
            hits.push(TraversalHit {
                node_id: neighbor.clone(),
                depth: depth + 1,
                call_count: edge.map_or(0, |e| e.call_count),
                avg_latency_ms: edge.map_or(0.0, |e| e.avg_latency_ms),
                error_rate: edge.map_or(0.0, |e| e.error_rate),
            });
            queue.push_back((neighbor, depth + 1));
        }
    }

    hits
}

/// Every node reachable from `seed` in `direction`, excluding the seed.
pub fn reachable(graph: &DependencyGraph, seed: &ApiId, direction: Direction) -> Vec<ApiId> {
    let mut order = Vec::new();
    let mut visited: HashSet<&ApiId> = HashSet::new();
    let mut queue: VecDeque<&ApiId> = VecDeque::new();

    visited.insert(seed);
    queue.push_back(seed);

    while let Some(current) = queue.pop_front() {
        for neighbor in step(graph, current, direction).into_iter().flatten() {
            if visited.insert(neighbor) {
                order.push(neighbor.clone());
                queue.push_back(neighbor);
            }
        }
    }

    order
}

/// All upstream callers and downstream dependencies regardless of depth.
pub fn full_chain(graph: &DependencyGraph, id: &ApiId) -> FullChain {
    FullChain {
        upstream: reachable(graph, id, Direction::Upstream),
        downstream: reachable(graph, id, Direction::Downstream),
    }
}

fn step<'g>(
    graph: &'g DependencyGraph,
    id: &ApiId,
    direction: Direction,
) -> Option<&'g std::collections::BTreeSet<ApiId>> {
    match direction {
        Direction::Upstream => graph.dependent_set(id),
        Direction::Downstream => graph.dependency_set(id),
    }
}
