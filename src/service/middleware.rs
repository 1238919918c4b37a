//! Service middleware for metrics and request tracking.
//!
//! ## Metrics Exposed
//!
//! All metrics are emitted as tracing events under the
//! `apiwatch_graph::metrics` target, to be aggregated from logs:
//!
//! - `request` - path pattern, method, status, latency
//! - `cache_lookup` - endpoint and hit/miss
//! - `export` - format and payload size

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "apiwatch_graph::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces API and team ids, and any UUID, with placeholders.
fn normalize_path(path: &str) -> String {
    static SEGMENT: OnceLock<regex_lite::Regex> = OnceLock::new();
    static UUID: OnceLock<regex_lite::Regex> = OnceLock::new();

    let segment = SEGMENT.get_or_init(|| {
        regex_lite::Regex::new(r"/(apis|teams)/[^/]+").expect("constant regex")
    });
    let uuid = UUID.get_or_init(|| {
        regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("constant regex")
    });

    let path = segment.replace_all(path, "/${1}/:id");
    uuid.replace_all(&path, ":id").to_string()
}

/// Record a response-cache lookup.
pub fn record_cache_lookup(endpoint: &str, hit: bool) {
    info!(
        target: "apiwatch_graph::metrics",
        metric_type = "cache_lookup",
        endpoint = endpoint,
        result = if hit { "hit" } else { "miss" },
        "cache_lookup_metric"
    );
}

/// Record a graph export.
pub fn record_export(format: &str, bytes: usize) {
    info!(
        target: "apiwatch_graph::metrics",
        metric_type = "export",
        format = format,
        bytes = bytes,
        "export_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_ids() {
        assert_eq!(
            normalize_path("/api/graph/apis/550e8400-e29b-41d4-a716-446655440000/dependents"),
            "/api/graph/apis/:id/dependents"
        );
        assert_eq!(normalize_path("/api/graph/teams/payments"), "/api/graph/teams/:id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/api/graph/stats"), "/api/graph/stats");
    }
}
