//! Cycle detection via Tarjan's strongly connected components.
//!
//! The traversal keeps its own frame stack instead of recursing, so the
//! depth of the call graph never translates into native stack depth.
//!
//! A component is reported as a cycle when it has more than one node, or a
//! single node that calls itself. Component order follows DFS discovery and
//! the order of ids inside a component follows the Tarjan stack; neither is
//! meaningful, so compare cycles as sets.

use std::collections::HashMap;

use crate::types::ApiId;

use super::DependencyGraph;

const UNVISITED: usize = usize::MAX;

/// DFS frame: a node and a cursor into its resolved successors.
struct Frame {
    node: usize,
    successors: Vec<usize>,
    next: usize,
}

/// Find all strongly connected components.
///
/// `out_neighbors` is called once per node. Neighbors that are not in
/// `node_ids` are ignored.
pub fn find_sccs<F>(node_ids: &[ApiId], mut out_neighbors: F) -> Vec<Vec<ApiId>>
where
    F: FnMut(&ApiId) -> Vec<ApiId>,
{
    let position: HashMap<&ApiId, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();

    let n = node_ids.len();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut sccs: Vec<Vec<ApiId>> = Vec::new();
    let mut next_index = 0usize;

    let mut resolve = |v: usize| -> Vec<usize> {
        out_neighbors(&node_ids[v])
            .iter()
            .filter_map(|id| position.get(id).copied())
            .collect()
    };

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = next_index;
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push(Frame {
            node: root,
            successors: resolve(root),
            next: 0,
        });

        while let Some(frame) = frames.last_mut() {
            let v = frame.node;

            if frame.next < frame.successors.len() {
                let w = frame.successors[frame.next];
                frame.next += 1;

                if index[w] == UNVISITED {
                    index[w] = next_index;
                    low[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push(Frame {
                        node: w,
                        successors: resolve(w),
                        next: 0,
                    });
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
                continue;
            }

            // All successors of v explored.
            frames.pop();
            if let Some(parent) = frames.last() {
                low[parent.node] = low[parent.node].min(low[v]);
            }

            if low[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(node_ids[w].clone());
                    if w == v {
                        break;
                    }
                }
                sccs.push(component);
            }
        }
    }

    sccs
}

/// Keep components that are cycles: size > 1, or one node with a self-loop.
pub fn sccs_to_cycles<F>(sccs: Vec<Vec<ApiId>>, mut has_self_loop: F) -> Vec<Vec<ApiId>>
where
    F: FnMut(&ApiId) -> bool,
{
    sccs.into_iter()
        .filter(|scc| match scc.as_slice() {
            [] => false,
            [single] => has_self_loop(single),
            _ => true,
        })
        .collect()
}

/// Detect all cycles in a dependency graph.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<ApiId>> {
    let node_ids = graph.node_ids();
    let sccs = find_sccs(&node_ids, |id| graph.dependencies(id));
    let cycles = sccs_to_cycles(sccs, |id| {
        graph
            .dependency_set(id)
            .map(|set| set.contains(id))
            .unwrap_or(false)
    });

    if !cycles.is_empty() {
        tracing::warn!(cycle_count = cycles.len(), "Dependency cycles detected");
    }

    cycles
}

/// Format a cycle as `A → B → A`, using `label` to name each node.
///
/// A single-node cycle is rendered as just its label.
pub fn describe_cycle<F>(cycle: &[ApiId], label: F) -> String
where
    F: Fn(&ApiId) -> String,
{
    let Some(first) = cycle.first() else {
        return String::new();
    };

    let labels: Vec<String> = cycle.iter().map(&label).collect();
    let mut description = labels.join(" → ");
    if cycle.len() > 1 {
        description.push_str(" → ");
        description.push_str(&label(first));
    }
    description
}

/// Describe every cycle, labelling nodes from the graph (falling back to the id).
pub fn describe_cycles(graph: &DependencyGraph, cycles: &[Vec<ApiId>]) -> Vec<String> {
    let label = |id: &ApiId| {
        graph
            .node(id)
            .map(|n| n.label.clone())
            .unwrap_or_else(|| id.to_string())
    };
    cycles.iter().map(|c| describe_cycle(c, label)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiNode, CallEdge};
    use std::collections::BTreeSet;

    fn id(s: &str) -> ApiId {
        ApiId::from(s)
    }

    fn build(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for n in nodes {
            graph.add_node(ApiNode::new(*n, format!("GET /{}", n)));
        }
        for (i, (s, t)) in edges.iter().enumerate() {
            graph.add_edge(CallEdge::new(format!("e{}", i), *s, *t)).unwrap();
        }
        graph
    }

    fn as_sets(cycles: Vec<Vec<ApiId>>) -> BTreeSet<BTreeSet<ApiId>> {
        cycles.into_iter().map(|c| c.into_iter().collect()).collect()
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let graph = build(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("a", "c"), ("c", "d")]);
        assert!(detect_cycles(&graph).is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        let graph = build(&["A", "B"], &[("A", "B"), ("B", "A")]);
        let cycles = detect_cycles(&graph);

        assert_eq!(cycles.len(), 1);
        assert_eq!(as_sets(cycles), [[id("A"), id("B")].into_iter().collect()].into_iter().collect());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let graph = build(&["A"], &[("A", "A")]);
        let cycles = detect_cycles(&graph);

        assert_eq!(cycles, vec![vec![id("A")]]);
    }

    #[test]
    fn test_single_node_without_self_loop_is_dropped() {
        let graph = build(&["A", "B"], &[("A", "B")]);
        assert!(detect_cycles(&graph).is_empty());
    }

    #[test]
    fn test_multiple_components() {
        // a <-> b, c -> d -> e -> c, f alone, g self-loop
        let graph = build(
            &["a", "b", "c", "d", "e", "f", "g"],
            &[("a", "b"), ("b", "a"), ("b", "c"), ("c", "d"), ("d", "e"), ("e", "c"), ("g", "g")],
        );

        let expected: BTreeSet<BTreeSet<ApiId>> = [
            [id("a"), id("b")].into_iter().collect(),
            [id("c"), id("d"), id("e")].into_iter().collect(),
            [id("g")].into_iter().collect(),
        ]
        .into_iter()
        .collect();
        assert_eq!(as_sets(detect_cycles(&graph)), expected);
    }

    #[test]
    fn test_find_sccs_covers_every_node() {
        let graph = build(&["a", "b", "c"], &[("a", "b"), ("b", "a")]);
        let ids = graph.node_ids();
        let sccs = find_sccs(&ids, |n| graph.dependencies(n));

        let total: usize = sccs.iter().map(Vec::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_find_sccs_ignores_unknown_neighbors() {
        let ids = vec![id("a")];
        let sccs = find_sccs(&ids, |_| vec![id("elsewhere")]);
        assert_eq!(sccs, vec![vec![id("a")]]);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        // 200k-node ring: one component, far deeper than a native recursion could go.
        let n = 200_000;
        let ids: Vec<ApiId> = (0..n).map(|i| ApiId::new(format!("n{:06}", i))).collect();
        let sccs = find_sccs(&ids, |node| {
            let i: usize = node.as_str()[1..].parse().unwrap();
            vec![ids[(i + 1) % n].clone()]
        });

        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), n);
    }

    #[test]
    fn test_describe_cycle() {
        let graph = build(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let text = describe_cycle(&[id("a"), id("b")], |n| graph.node(n).unwrap().label.clone());
        assert_eq!(text, "GET /a → GET /b → GET /a");

        assert_eq!(describe_cycle(&[id("x")], |n| n.to_string()), "x");
        assert_eq!(describe_cycle(&[], |n| n.to_string()), "");
    }

    #[test]
    fn test_describe_cycles_falls_back_to_id() {
        let graph = build(&["a"], &[]);
        let descriptions = describe_cycles(&graph, &[vec![id("a"), id("ghost")]]);
        assert_eq!(descriptions, vec!["GET /a → ghost → GET /a".to_string()]);
    }
}
