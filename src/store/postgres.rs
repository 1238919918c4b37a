//! PostgreSQL graph source for production use.
//!
//! Reads the `apis` and `dependency_edges` tables.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use crate::types::{ApiNode, CallEdge, ThreatLevel};
use super::{GraphSource, PoolStats};

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/apiwatch".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// PostgreSQL graph source.
///
/// Uses connection pooling; each load issues two full-table reads.
pub struct PostgresGraphSource {
    pool: PgPool,
}

impl PostgresGraphSource {
    /// Create a new source with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a source from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    fn parse_node_row(row: &sqlx::postgres::PgRow) -> Result<ApiNode, sqlx::Error> {
        let id: Uuid = row.try_get("id")?;
        let repo_id: Uuid = row.try_get("repo_id")?;
        let method: String = row.try_get("method")?;
        let path: String = row.try_get("path")?;
        let team_id: String = row.try_get("team_id")?;
        let squad_id: String = row.try_get("squad_id")?;
        let location_id: String = row.try_get("location_id")?;

        Ok(ApiNode::new(id, format!("{} {}", method, path))
            .with_owner(repo_id.to_string(), team_id, squad_id, location_id)
            .with_threat_level(ThreatLevel::Low))
    }

    fn parse_edge_row(row: &sqlx::postgres::PgRow, loaded_at: DateTime<Utc>) -> Result<CallEdge, sqlx::Error> {
        let id: Uuid = row.try_get("id")?;
        let source: Uuid = row.try_get("source_api_id")?;
        let target: Uuid = row.try_get("target_api_id")?;
        let call_count: Option<i32> = row.try_get("call_count")?;
        let error_count: Option<i32> = row.try_get("error_count")?;
        let avg_latency_ms: Option<i32> = row.try_get("avg_latency_ms")?;
        // Timestamp columns are `timestamp` without time zone, stored as UTC.
        let last_called_at: Option<chrono::NaiveDateTime> = row.try_get("last_called_at")?;

        let call_count = call_count.unwrap_or(0).max(0) as u64;
        let error_count = error_count.unwrap_or(0).max(0) as u64;

        Ok(CallEdge::new(id, source, target)
            .with_traffic(call_count, avg_latency_ms.unwrap_or(0) as f64, error_count)
            .with_last_called_at(
                last_called_at
                    .map(|t| Utc.from_utc_datetime(&t))
                    .unwrap_or(loaded_at),
            ))
    }
}

/// Error type for PostgreSQL source.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
impl GraphSource for PostgresGraphSource {
    type Error = PostgresError;

    async fn fetch_nodes(&self) -> Result<Vec<ApiNode>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, repo_id, method, path, team_id, squad_id, location_id
            FROM apis
            ORDER BY id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_node_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn fetch_edges(&self) -> Result<Vec<CallEdge>, Self::Error> {
        let loaded_at = Utc::now();
        let rows = sqlx::query(
            r#"
            SELECT id, source_api_id, target_api_id, call_count, error_count,
                   avg_latency_ms, last_called_at
            FROM dependency_edges
            ORDER BY id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::parse_edge_row(row, loaded_at))
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        })
    }
}
