//! Text exports of a serialized graph: Graphviz DOT and CSV.

use std::fmt::Write as _;

use crate::types::{SerializedGraph, ThreatLevel};

/// Render the graph as a Graphviz digraph.
///
/// Nodes are coloured by threat level and sized by centrality; edges are
/// labelled with their call count.
pub fn to_dot(graph: &SerializedGraph) -> String {
    let mut out = String::from("digraph G {\n");

    for node in &graph.nodes {
        let color = match node.threat_level {
            ThreatLevel::Critical => "red",
            ThreatLevel::Neutral => "orange",
            ThreatLevel::Low => "green",
        };
        let width = (1.0 + node.centrality_score * 0.2).max(0.5);
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\", color={}, width={:.2}];",
            dot_escape(node.id.as_str()),
            dot_escape(&node.label),
            color,
            width
        );
    }

    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{} calls\"];",
            dot_escape(edge.source_api_id.as_str()),
            dot_escape(edge.target_api_id.as_str()),
            edge.call_count
        );
    }

    out.push('}');
    out
}

/// Node table: `id,label,team,threatLevel,centrality`.
pub fn nodes_csv(graph: &SerializedGraph) -> String {
    let mut lines = vec!["id,label,team,threatLevel,centrality".to_string()];
    lines.extend(graph.nodes.iter().map(|n| {
        format!(
            "{},{},{},{},{}",
            csv_escape(n.id.as_str()),
            csv_escape(&n.label),
            csv_escape(&n.team_id),
            n.threat_level,
            n.centrality_score
        )
    }));
    lines.join("\n")
}

/// Edge table: `source,target,callCount,avgLatencyMs,errorRate`.
pub fn edges_csv(graph: &SerializedGraph) -> String {
    let mut lines = vec!["source,target,callCount,avgLatencyMs,errorRate".to_string()];
    lines.extend(graph.edges.iter().map(|e| {
        format!(
            "{},{},{},{},{}",
            csv_escape(e.source_api_id.as_str()),
            csv_escape(e.target_api_id.as_str()),
            e.call_count,
            e.avg_latency_ms,
            e.error_rate
        )
    }));
    lines.join("\n")
}

/// Both tables in one document, each under its own `nodes:` / `edges:` heading.
pub fn to_csv(graph: &SerializedGraph) -> String {
    format!("nodes:\n{}\n\nedges:\n{}", nodes_csv(graph), edges_csv(graph))
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn csv_escape(s: &str) -> String {
    if s.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
