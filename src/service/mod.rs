//! Dependency Graph REST Service
//!
//! Exposes the graph engine over HTTP.
//!
//! ## Endpoints
//!
//! - `GET /api/graph/apis/:api_id/dependents?depth=` - Upstream callers (cached)
//! - `GET /api/graph/apis/:api_id/dependencies?depth=` - Downstream callees
//! - `GET /api/graph/apis/:api_id/chain` - All transitive callers and callees
//! - `GET /api/graph/apis/:api_id/depth` - Deepest upstream caller distance
//! - `GET /api/graph/critical-path` - Greedy critical path
//! - `GET /api/graph/full?cursor=&limit=` - Centrality-ordered node pages
//! - `GET /api/graph/teams/:team_id` - A team's subgraph
//! - `GET /api/graph/stats` - Node/edge/cycle counts (cached)
//! - `GET /api/graph/cycles` - Detected cycles with descriptions
//! - `GET /api/graph/export?format=dot|csv` - Graphviz or CSV export
//! - `POST /api/graph/reset` - Invalidate cache and reload the graph lazily
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_cache_lookup, record_export};
pub use routes::{create_router, AppState, ErrorResponse};
pub use state::ServiceState;
