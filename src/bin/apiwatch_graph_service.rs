//! HTTP front end for the API dependency graph.
//!
//! Connects to the `apis` / `dependency_edges` tables, optionally loads the
//! graph before binding, and serves the `/api/graph` routes until SIGTERM.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `PORT`: Service port (default: 8002)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `GRAPH_WARM_START`: Load the graph at boot (default: false)
//! - `GRAPH_MAX_STALENESS_SECS`, `GRAPH_DEFAULT_DEPTH`: graph settings
//! - `GRAPH_CACHE_TTL_SECS`, `GRAPH_CACHE_MAX_ENTRIES`, `GRAPH_CACHE_ENABLED`: cache settings
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: `json` (default) or `pretty`
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run --bin apiwatch_graph_service --features service
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use apiwatch_graph::service::{create_router, metrics_middleware, ServiceState};
use apiwatch_graph::PostgresGraphSource;

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "apiwatch_graph_service=info,apiwatch_graph=info,tower_http=info,sqlx=warn".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true)
            )
            .init();
    }
}

/// Access log line per request, keyed by `X-Request-Id` when the caller sends one.
async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!("request", request_id = %request_id, method = %method, path = %path);
    let response = next.run(request).instrument(span).await;

    info!(
        target: "apiwatch_graph_service::access",
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    info!(version, "apiwatch graph service starting");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8002);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let warm_start = std::env::var("GRAPH_WARM_START")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(false);

    let connect_start = Instant::now();

    let source = match tokio::time::timeout(
        std::time::Duration::from_secs(30),
        PostgresGraphSource::from_env()
    ).await {
        Ok(Ok(source)) => source,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            return Err(e.into());
        }
        Err(_) => {
            tracing::error!("PostgreSQL connection timeout after 30s");
            return Err("Database connection timeout".into());
        }
    };

    info!(latency_ms = connect_start.elapsed().as_millis() as u64, "Graph source connected");

    let state = ServiceState::from_env(source);
    info!(
        max_staleness_secs = ?state.graph.config().max_staleness.map(|d| d.as_secs()),
        default_depth = state.default_depth(),
        "Graph service configured"
    );

    if warm_start {
        // A failed warm start is not fatal; the first query retries.
        match state.graph.snapshot().await {
            Ok(loaded) => info!(
                node_count = loaded.report().node_count,
                edge_count = loaded.report().edge_count,
                "Graph warmed"
            ),
            Err(e) => warn!(error = %e, "Graph warm start failed"),
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(access_log))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "Listening");

    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Ctrl+C received, draining"),
            _ = terminate => info!("SIGTERM received, draining"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Shut down");

    Ok(())
}
