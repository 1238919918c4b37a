//! Critical path heuristic and upstream depth.
//!
//! The exact longest path is NP-hard on graphs that may contain cycles, so
//! [`critical_path`] is a greedy approximation:
//!
//! 1. Rank all nodes by descending centrality.
//! 2. From each node not yet on a chain, repeatedly step to the
//!    highest-centrality callee not yet on any chain.
//! 3. Keep the longest chain found.
//!
//! Equal scores are broken by enumeration order (id order here). Callers
//! should treat that order as arbitrary. The result depends on centrality
//! having been computed first.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

use crate::types::{ApiId, ApiNode};

use super::DependencyGraph;

/// Greedy longest chain by centrality.
pub fn critical_path(graph: &DependencyGraph) -> Vec<ApiId> {
    let mut ranked: Vec<&ApiNode> = graph.nodes().collect();
    // Stable sort: ties keep id order.
    ranked.sort_by(|a, b| by_score_desc(a, b));

    let mut used: HashSet<&ApiId> = HashSet::new();
    let mut best: Vec<ApiId> = Vec::new();

    for start in ranked {
        if used.contains(&start.id) {
            continue;
        }

        let mut chain = Vec::new();
        let mut current = Some(start);

        while let Some(node) = current {
            used.insert(&node.id);
            chain.push(node.id.clone());

            current = graph
                .dependency_set(&node.id)
                .into_iter()
                .flatten()
                .filter(|callee| !used.contains(callee))
                .filter_map(|callee| graph.node(callee))
                // min_by keeps the first of equal elements.
                .min_by(|a, b| by_score_desc(a, b));
        }

        if chain.len() > best.len() {
            best = chain;
        }
    }

    best
}

/// Maximum upstream distance: how many caller hops lead into `id`.
pub fn dependency_depth(graph: &DependencyGraph, id: &ApiId) -> u32 {
    let mut visited: HashSet<&ApiId> = HashSet::new();
    let mut queue: VecDeque<(&ApiId, u32)> = VecDeque::new();
    let mut max_depth = 0;

    visited.insert(id);
    queue.push_back((id, 0));

    while let Some((current, depth)) = queue.pop_front() {
        max_depth = max_depth.max(depth);
        for caller in graph.dependent_set(current).into_iter().flatten() {
            if visited.insert(caller) {
                queue.push_back((caller, depth + 1));
            }
        }
    }

    max_depth
}

fn by_score_desc(a: &ApiNode, b: &ApiNode) -> Ordering {
    b.centrality_score
        .partial_cmp(&a.centrality_score)
        .unwrap_or(Ordering::Equal)
}
