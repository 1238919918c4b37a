//! Graph sources: where the dependency graph is loaded from.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use crate::types::{ApiNode, CallEdge};

/// Trait for persistence backends the graph is populated from.
///
/// Both fetches return the full table, already normalized into graph types.
/// A fetch failure aborts the whole load; implementations should not return
/// partial results.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Error type for source operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch every registered API endpoint.
    async fn fetch_nodes(&self) -> Result<Vec<ApiNode>, Self::Error>;

    /// Fetch every observed call dependency.
    async fn fetch_edges(&self) -> Result<Vec<CallEdge>, Self::Error>;

    /// Whether the backend is reachable right now.
    async fn is_healthy(&self) -> bool {
        true
    }

    /// Connection pool statistics, for backends that pool connections.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

pub use memory::{InMemoryGraphSource, InMemorySourceError};

#[cfg(feature = "postgres")]
pub use postgres::PostgresGraphSource;
