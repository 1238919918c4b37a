//! HTTP-level tests for the dependency graph service.
//!
//! Runs the full router (with metrics middleware) over an in-memory source.

#![cfg(feature = "service")]

use std::sync::Arc;

use apiwatch_graph::service::{create_router, metrics_middleware, ServiceState};
use apiwatch_graph::{
    ApiNode, CacheConfig, CallEdge, GraphService, GraphStats, InMemoryGraphSource, LoadState,
    LruGraphCache, ThreatLevel,
};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn seeded_source() -> InMemoryGraphSource {
    InMemoryGraphSource::with_rows(
        vec![
            ApiNode::new("web", "GET /").with_owner("repo-web", "frontend", "s1", "eu"),
            ApiNode::new("cart", "GET /cart").with_owner("repo-cart", "commerce", "s2", "eu"),
            ApiNode::new("pricing", "GET /price")
                .with_owner("repo-pricing", "commerce", "s2", "eu")
                .with_threat_level(ThreatLevel::Critical),
            ApiNode::new("stock", "GET /stock").with_owner("repo-stock", "supply", "s3", "us"),
        ],
        vec![
            CallEdge::new("e1", "web", "cart").with_traffic(1_000, 15.0, 10),
            CallEdge::new("e2", "cart", "pricing").with_traffic(900, 22.0, 0),
            CallEdge::new("e3", "cart", "stock").with_traffic(450, 31.0, 45),
        ],
    )
}

fn state_for(source: InMemoryGraphSource) -> ServiceState<InMemoryGraphSource> {
    ServiceState::new(
        Arc::new(GraphService::new(Arc::new(source))),
        Arc::new(LruGraphCache::new(CacheConfig::default())),
    )
}

fn app(state: &ServiceState<InMemoryGraphSource>) -> Router {
    create_router(state.clone()).layer(axum::middleware::from_fn(metrics_middleware))
}

async fn call(state: &ServiceState<InMemoryGraphSource>, method: &str, uri: &str) -> (StatusCode, String, Option<String>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
}

async fn call_json(state: &ServiceState<InMemoryGraphSource>, uri: &str) -> serde_json::Value {
    let (status, body, _) = call(state, "GET", uri).await;
    assert_eq!(status, StatusCode::OK, "{} -> {}", uri, body);
    serde_json::from_str(&body).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dependents_payload_shape() {
    let state = state_for(seeded_source());
    let body = call_json(&state, "/api/graph/apis/stock/dependents").await;

    let hits = body["dependents"].as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["nodeId"], "cart");
    assert_eq!(hits[0]["depth"], 1);
    assert_eq!(hits[0]["callCount"], 450);
    assert_eq!(hits[0]["errorRate"], 0.1);
    assert_eq!(hits[1]["nodeId"], "web");
    assert_eq!(hits[1]["depth"], 2);
}

#[tokio::test]
async fn test_depth_limits_dependencies() {
    let state = state_for(seeded_source());

    let shallow = call_json(&state, "/api/graph/apis/web/dependencies?depth=1").await;
    assert_eq!(shallow["dependencies"].as_array().unwrap().len(), 1);

    let deep = call_json(&state, "/api/graph/apis/web/dependencies?depth=2").await;
    assert_eq!(deep["dependencies"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_full_graph_is_centrality_ordered() {
    let state = state_for(seeded_source());
    let body = call_json(&state, "/api/graph/full").await;

    let scores: Vec<f64> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["centralityScore"].as_f64().unwrap())
        .collect();
    assert_eq!(scores.len(), 4);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(body["metadata"]["nodeCount"], 4);
    assert_eq!(body["metadata"]["edgeCount"], 3);
    assert!(body["nextCursor"].is_null());
}

#[tokio::test]
async fn test_team_and_cycles() {
    let state = state_for(seeded_source());

    let team = call_json(&state, "/api/graph/teams/commerce").await;
    assert_eq!(team["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(team["edges"].as_array().unwrap().len(), 1);

    let cycles = call_json(&state, "/api/graph/cycles").await;
    assert!(cycles["cycles"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_exports_set_content_type() {
    let state = state_for(seeded_source());

    let (status, dot, content_type) = call(&state, "GET", "/api/graph/export?format=dot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/vnd.graphviz"));
    assert!(dot.contains("\"pricing\" [label=\"GET /price\", color=red"));
    assert_eq!(dot.lines().filter(|l| l.contains("->")).count(), 3);

    let (_, csv, content_type) = call(&state, "GET", "/api/graph/export?format=csv").await;
    assert_eq!(content_type.as_deref(), Some("text/csv"));
    let (nodes, edges) = csv.split_once("\n\nedges:\n").unwrap();
    assert_eq!(nodes.lines().count(), 1 + 1 + 4);
    assert_eq!(edges.lines().count(), 1 + 3);
}

#[tokio::test]
async fn test_new_edges_visible_after_reset() {
    let state = state_for(seeded_source());

    let stats: GraphStats = serde_json::from_value(call_json(&state, "/api/graph/stats").await).unwrap();
    assert_eq!(stats.edge_count, 3);

    // Ingestion records a new dependency that closes a loop.
    state.graph.source().add_edge(CallEdge::new("e4", "stock", "cart").with_traffic(5, 9.0, 0));

    let stats: GraphStats = serde_json::from_value(call_json(&state, "/api/graph/stats").await).unwrap();
    assert_eq!(stats.edge_count, 3);

    let (status, _, _) = call(&state, "POST", "/api/graph/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.graph.state(), LoadState::Unloaded);

    let stats: GraphStats = serde_json::from_value(call_json(&state, "/api/graph/stats").await).unwrap();
    assert_eq!(stats.edge_count, 4);
    assert_eq!(stats.cycle_count, 1);

    let cycles = call_json(&state, "/api/graph/cycles").await;
    let description = cycles["descriptions"][0].as_str().unwrap();
    assert!(description.contains("GET /cart") && description.contains("GET /stock"));
}

#[tokio::test]
async fn test_unavailable_source_then_recovery() {
    let source = seeded_source();
    source.set_offline("connection refused");
    let state = state_for(source);

    let (status, body, _) = call(&state, "GET", "/api/graph/critical-path").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("GRAPH_UNAVAILABLE"));
    assert_eq!(state.graph.state(), LoadState::Unloaded);

    let health = call_json(&state, "/health").await;
    assert_eq!(health["status"], "degraded");

    state.graph.source().set_online();
    let body = call_json(&state, "/api/graph/critical-path").await;
    assert!(!body["criticalPath"].as_array().unwrap().is_empty());
    assert_eq!(state.graph.state(), LoadState::Loaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_requests_share_one_load() {
    let state = state_for(seeded_source());

    let requests: Vec<_> = (0..12)
        .map(|i| {
            let state = state.clone();
            tokio::spawn(async move {
                let uri = if i % 2 == 0 {
                    "/api/graph/apis/cart/dependencies"
                } else {
                    "/api/graph/critical-path"
                };
                call(&state, "GET", uri).await.0
            })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(state.graph.loads_started(), 1);
}
