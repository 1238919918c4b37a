//! Axum routes for the dependency graph service.

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::cache::{self, CacheKey, GraphCache};
use crate::export;
use crate::graph_service::{GraphServiceError, LoadState};
use crate::store::{GraphSource, PostgresGraphSource};
use crate::types::{ApiId, CycleReport, FullChain, GraphPage, GraphStats, Subgraph, TraversalHit};

use super::middleware::{record_cache_lookup, record_export};
use super::state::ServiceState;

/// Type alias for the service state with PostgresGraphSource.
pub type AppState = ServiceState<PostgresGraphSource>;

const DEPENDENTS_ROUTE: &str = "/api/graph/apis/:api_id/dependents";
const STATS_ROUTE: &str = "/api/graph/stats";

const DEPTH_RANGE: RangeInclusive<u32> = 1..=10;
const LIMIT_RANGE: RangeInclusive<u32> = 1..=500;
const DEFAULT_LIMIT: u32 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// `?depth=` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepthQuery {
    /// Traversal depth, 1..=10.
    pub depth: Option<String>,
}

/// `?cursor=&limit=` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// Id of the last node on the previous page.
    pub cursor: Option<String>,
    /// Page size, 1..=500.
    pub limit: Option<String>,
}

/// `?format=` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    /// `dot` (default) or `csv`.
    pub format: Option<String>,
}

/// Upstream callers of an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependentsResponse {
    /// BFS hits, nearest first.
    pub dependents: Vec<TraversalHit>,
}

/// Downstream callees of an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenciesResponse {
    /// BFS hits, nearest first.
    pub dependencies: Vec<TraversalHit>,
}

/// Greedy critical path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPathResponse {
    /// Endpoint ids along the path.
    pub critical_path: Vec<ApiId>,
}

/// Deepest upstream caller distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthResponse {
    /// The queried endpoint.
    pub api_id: ApiId,
    /// Max hop count to any transitive caller.
    pub depth: u32,
}

/// Result of a graph reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    /// Cached responses dropped.
    pub invalidated_entries: usize,
    /// Graph state after the reset.
    pub state: LoadState,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Graph lifecycle state.
    pub graph: LoadState,
    /// When the installed graph was built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub pool_size: u32,
    pub pool_idle: usize,
    pub pool_max: u32,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    /// Whether the graph source is reachable.
    pub source: bool,
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn unavailable(e: GraphServiceError) -> ApiError {
    tracing::warn!(error = %e, "Graph query failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new("GRAPH_UNAVAILABLE", e.to_string())),
    )
}

fn parse_bounded(
    name: &str,
    code: &str,
    raw: Option<&str>,
    default: u32,
    range: RangeInclusive<u32>,
) -> ApiResult<u32> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if range.contains(&value) => Ok(value),
        _ => Err((
            StatusCode::BAD_REQUEST,
            Json(
                ErrorResponse::new(
                    code,
                    format!("{} must be an integer in {}..={}", name, range.start(), range.end()),
                )
                .with_details(raw),
            ),
        )),
    }
}

/// Cached value, or `None` on miss or cache failure.
async fn cached<T: serde::de::DeserializeOwned>(
    cache: &dyn GraphCache,
    endpoint: &str,
    key: &CacheKey,
) -> Option<T> {
    match cache::get_json(cache, key).await {
        Ok(value) => {
            record_cache_lookup(endpoint, value.is_some());
            value
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache read failed");
            None
        }
    }
}

async fn store<T: Serialize>(cache: &dyn GraphCache, key: &CacheKey, value: &T) {
    if let Err(e) = cache::set_json(cache, key, value).await {
        tracing::warn!(key = %key, error = %e, "Cache write failed");
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Upstream callers of an endpoint, up to `depth` hops. Cached.
async fn dependents_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(api_id): Path<String>,
    Query(query): Query<DepthQuery>,
) -> ApiResult<Json<DependentsResponse>> {
    let depth = parse_bounded("depth", "INVALID_DEPTH", query.depth.as_deref(), state.default_depth(), DEPTH_RANGE)?;
    let key = CacheKey::new(DEPENDENTS_ROUTE, &[("apiId", &api_id), ("depth", &depth.to_string())]);

    if let Some(hit) = cached(&*state.cache, DEPENDENTS_ROUTE, &key).await {
        return Ok(Json(hit));
    }

    let dependents = state
        .graph
        .dependents(&ApiId::new(api_id), depth)
        .await
        .map_err(unavailable)?;
    let response = DependentsResponse { dependents };
    store(&*state.cache, &key, &response).await;
    Ok(Json(response))
}

/// Downstream callees of an endpoint, up to `depth` hops.
async fn dependencies_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(api_id): Path<String>,
    Query(query): Query<DepthQuery>,
) -> ApiResult<Json<DependenciesResponse>> {
    let depth = parse_bounded("depth", "INVALID_DEPTH", query.depth.as_deref(), state.default_depth(), DEPTH_RANGE)?;
    let dependencies = state
        .graph
        .dependencies(&ApiId::new(api_id), depth)
        .await
        .map_err(unavailable)?;
    Ok(Json(DependenciesResponse { dependencies }))
}

/// Every transitive caller and callee.
async fn chain_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(api_id): Path<String>,
) -> ApiResult<Json<FullChain>> {
    let chain = state
        .graph
        .full_chain(&ApiId::new(api_id))
        .await
        .map_err(unavailable)?;
    Ok(Json(chain))
}

async fn depth_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(api_id): Path<String>,
) -> ApiResult<Json<DepthResponse>> {
    let api_id = ApiId::new(api_id);
    let depth = state
        .graph
        .dependency_depth(&api_id)
        .await
        .map_err(unavailable)?;
    Ok(Json(DepthResponse { api_id, depth }))
}

async fn critical_path_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> ApiResult<Json<CriticalPathResponse>> {
    let critical_path = state.graph.critical_path().await.map_err(unavailable)?;
    Ok(Json(CriticalPathResponse { critical_path }))
}

/// Centrality-ordered page of nodes, plus all edges.
async fn full_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<GraphPage>> {
    let limit = parse_bounded("limit", "INVALID_LIMIT", query.limit.as_deref(), DEFAULT_LIMIT, LIMIT_RANGE)?;
    let cursor = query.cursor.map(ApiId::new);
    let page = state
        .graph
        .full_page(cursor.as_ref(), limit as usize)
        .await
        .map_err(unavailable)?;
    Ok(Json(page))
}

async fn team_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<Subgraph>> {
    let subgraph = state.graph.team_subgraph(&team_id).await.map_err(unavailable)?;
    Ok(Json(subgraph))
}

/// Node, edge and cycle counts. Cached.
async fn stats_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> ApiResult<Json<GraphStats>> {
    let key = CacheKey::new(STATS_ROUTE, &[("q", "stats")]);

    if let Some(hit) = cached(&*state.cache, STATS_ROUTE, &key).await {
        return Ok(Json(hit));
    }

    let stats = state.graph.stats().await.map_err(unavailable)?;
    store(&*state.cache, &key, &stats).await;
    Ok(Json(stats))
}

async fn cycles_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> ApiResult<Json<CycleReport>> {
    let report = state.graph.cycle_report().await.map_err(unavailable)?;
    Ok(Json(report))
}

/// Whole graph as Graphviz DOT or CSV.
async fn export_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let format = query.format.unwrap_or_else(|| "dot".to_string());
    if format != "dot" && format != "csv" {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("INVALID_FORMAT", "format must be dot or csv").with_details(format)),
        ));
    }

    let serialized = state.graph.serialize().await.map_err(unavailable)?;
    let (content_type, body) = if format == "dot" {
        ("text/vnd.graphviz", export::to_dot(&serialized))
    } else {
        ("text/csv", export::to_csv(&serialized))
    };

    record_export(&format, body.len());
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// Drop cached responses and the in-memory graph.
///
/// Called by ingestion after new dependency edges are recorded.
async fn reset_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<ResetResponse> {
    let invalidated_entries = state.cache.invalidate_all().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Cache invalidation failed");
        0
    });
    state.graph.reset();

    Json(ResetResponse {
        invalidated_entries,
        state: state.graph.state(),
    })
}

/// Health check endpoint (detailed).
async fn health_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    let source = state.graph.source();
    let healthy = source.is_healthy().await;

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        graph: state.graph.state(),
        loaded_at: state.graph.loaded_at(),
        database: source.pool_stats().map(|pool| DatabaseHealth {
            connected: healthy,
            pool_size: pool.size,
            pool_idle: pool.idle,
            pool_max: pool.max,
        }),
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the graph source is reachable, 503 otherwise.
async fn readiness_handler<S: GraphSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.graph.source().is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            source: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                source: false,
                details: Some("Graph source unreachable".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the dependency graph service.
pub fn create_router<S: GraphSource + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Per-endpoint queries
        .route(DEPENDENTS_ROUTE, get(dependents_handler::<S>))
        .route("/api/graph/apis/:api_id/dependencies", get(dependencies_handler::<S>))
        .route("/api/graph/apis/:api_id/chain", get(chain_handler::<S>))
        .route("/api/graph/apis/:api_id/depth", get(depth_handler::<S>))
        // Whole-graph queries
        .route("/api/graph/critical-path", get(critical_path_handler::<S>))
        .route("/api/graph/full", get(full_handler::<S>))
        .route("/api/graph/teams/:team_id", get(team_handler::<S>))
        .route(STATS_ROUTE, get(stats_handler::<S>))
        .route("/api/graph/cycles", get(cycles_handler::<S>))
        .route("/api/graph/export", get(export_handler::<S>))
        .route("/api/graph/reset", post(reset_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
}
