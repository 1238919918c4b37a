//! Structural importance of each endpoint.
//!
//! ```text
//! centrality = in_degree + 0.5 * transitive_in_degree + call_frequency
//! ```
//!
//! - `in_degree` / `out_degree` count distinct neighbors present in the graph.
//! - `transitive_in_degree` sums in-neighbor counts up to two hops upstream.
//!   There is no visited set: on a cyclic graph a node can be counted more
//!   than once. It is an approximate fan-in signal, not a reachability count.
//! - `call_frequency` is the node's share of all observed outbound calls.
//!
//! The score ranks nodes against each other within one graph. It is not
//! normalized, not a probability, and not betweenness or eigenvector
//! centrality.

use std::collections::BTreeMap;

use crate::types::ApiId;

use super::DependencyGraph;

/// Hops followed by the transitive in-degree.
pub const TRANSITIVE_DEPTH: u32 = 2;

/// Weight of the transitive in-degree in the final score.
pub const TRANSITIVE_WEIGHT: f64 = 0.5;

/// Per-node centrality components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentralityScores {
    /// Distinct callers present in the graph.
    pub in_degree: u32,
    /// Distinct callees present in the graph.
    pub out_degree: u32,
    /// Approximate upstream fan-in (see module docs).
    pub transitive_in_degree: u64,
    /// Share of all outbound calls, in [0, 1].
    pub call_frequency: f64,
    /// Combined score.
    pub score: f64,
}

/// Sum of in-neighbor counts up to `depth` hops upstream, without a cycle guard.
pub fn transitive_in_degree(graph: &DependencyGraph, id: &ApiId, depth: u32) -> u64 {
    if depth == 0 {
        return 0;
    }
    let Some(callers) = graph.dependent_set(id) else {
        return 0;
    };

    let mut count = callers.len() as u64;
    for caller in callers {
        count += transitive_in_degree(graph, caller, depth - 1);
    }
    count
}

/// Compute centrality components for every node.
pub fn compute_centrality(graph: &DependencyGraph) -> BTreeMap<ApiId, CentralityScores> {
    let total_calls: u64 = graph.edges().map(|e| e.call_count).sum();

    let mut outbound_calls: BTreeMap<&ApiId, u64> = BTreeMap::new();
    for edge in graph.edges() {
        if graph.contains_node(&edge.source_api_id) {
            *outbound_calls.entry(&edge.source_api_id).or_default() += edge.call_count;
        }
    }

    let present = |set: Option<&std::collections::BTreeSet<ApiId>>| -> u32 {
        set.map(|s| s.iter().filter(|n| graph.contains_node(n)).count() as u32)
            .unwrap_or(0)
    };

    graph
        .nodes()
        .map(|node| {
            let in_degree = present(graph.dependent_set(&node.id));
            let out_degree = present(graph.dependency_set(&node.id));
            let transitive = transitive_in_degree(graph, &node.id, TRANSITIVE_DEPTH);
            let call_frequency = if total_calls == 0 {
                0.0
            } else {
                outbound_calls.get(&node.id).copied().unwrap_or(0) as f64 / total_calls as f64
            };
            let score = in_degree as f64 + TRANSITIVE_WEIGHT * transitive as f64 + call_frequency;

            (
                node.id.clone(),
                CentralityScores {
                    in_degree,
                    out_degree,
                    transitive_in_degree: transitive,
                    call_frequency,
                    score,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiNode, CallEdge};

    fn id(s: &str) -> ApiId {
        ApiId::from(s)
    }

    fn build(nodes: &[&str], edges: &[(&str, &str, u64)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for n in nodes {
            graph.add_node(ApiNode::new(*n, *n));
        }
        for (i, (s, t, calls)) in edges.iter().enumerate() {
            graph
                .add_edge(CallEdge::new(format!("e{}", i), *s, *t).with_traffic(*calls, 5.0, 0))
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_hub_outranks_isolated_node() {
        let graph = build(&["A", "B", "C", "D"], &[("A", "B", 10), ("C", "B", 5)]);
        let scores = compute_centrality(&graph);

        assert_eq!(scores[&id("B")].in_degree, 2);
        assert!(scores[&id("B")].score > scores[&id("D")].score);
        assert_eq!(scores[&id("D")].score, 0.0);
    }

    #[test]
    fn test_call_frequency_share() {
        let graph = build(&["A", "B", "C"], &[("A", "B", 30), ("C", "B", 10)]);
        let scores = compute_centrality(&graph);

        assert!((scores[&id("A")].call_frequency - 0.75).abs() < 1e-9);
        assert!((scores[&id("C")].call_frequency - 0.25).abs() < 1e-9);
        assert_eq!(scores[&id("B")].call_frequency, 0.0);
    }

    #[test]
    fn test_zero_traffic_gives_zero_frequency() {
        let graph = build(&["A", "B"], &[("A", "B", 0)]);
        let scores = compute_centrality(&graph);
        assert_eq!(scores[&id("A")].call_frequency, 0.0);
        assert_eq!(scores[&id("B")].score, 1.0 + TRANSITIVE_WEIGHT * 1.0);
    }

    #[test]
    fn test_transitive_in_degree_two_hops() {
        // X -> A -> B -> C ; Y -> A
        let graph = build(
            &["X", "Y", "A", "B", "C"],
            &[("X", "A", 1), ("Y", "A", 1), ("A", "B", 1), ("B", "C", 1)],
        );

        // C: in(C) = {B} -> 1, plus in(B) = {A} -> 1. Depth stops before X/Y.
        assert_eq!(transitive_in_degree(&graph, &id("C"), TRANSITIVE_DEPTH), 2);
        // B: in(B) = {A} -> 1, plus in(A) = {X, Y} -> 2.
        assert_eq!(transitive_in_degree(&graph, &id("B"), TRANSITIVE_DEPTH), 3);
        assert_eq!(transitive_in_degree(&graph, &id("B"), 0), 0);
    }

    #[test]
    fn test_transitive_in_degree_double_counts_on_cycle() {
        // A <-> B: walking upstream from A revisits A.
        let graph = build(&["A", "B"], &[("A", "B", 1), ("B", "A", 1)]);
        assert_eq!(transitive_in_degree(&graph, &id("A"), TRANSITIVE_DEPTH), 2);
    }

    #[test]
    fn test_score_formula() {
        let graph = build(&["A", "B", "C"], &[("A", "B", 1), ("B", "C", 3)]);
        let scores = compute_centrality(&graph);
        let c = scores[&id("C")];

        let expected = c.in_degree as f64
            + TRANSITIVE_WEIGHT * c.transitive_in_degree as f64
            + c.call_frequency;
        assert!((c.score - expected).abs() < 1e-12);
        assert_eq!(c.in_degree, 1);
        assert_eq!(c.transitive_in_degree, 2);
    }
}
