//! Observed call relationships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::ApiId;

/// Identifier of a call edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EdgeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<uuid::Uuid> for EdgeId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Observed caller → callee relationship with traffic statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEdge {
    /// Unique edge identifier.
    pub id: EdgeId,
    /// Calling endpoint.
    pub source_api_id: ApiId,
    /// Called endpoint.
    pub target_api_id: ApiId,
    /// Total observed calls (monotonic).
    pub call_count: u64,
    /// Time of the most recent observed call.
    pub last_called_at: DateTime<Utc>,
    /// Running average latency.
    pub avg_latency_ms: f64,
    /// Fraction of failed calls in [0, 1].
    pub error_rate: f64,
}

impl CallEdge {
    /// Create an edge with no recorded traffic.
    pub fn new(id: impl Into<EdgeId>, source: impl Into<ApiId>, target: impl Into<ApiId>) -> Self {
        Self {
            id: id.into(),
            source_api_id: source.into(),
            target_api_id: target.into(),
            call_count: 0,
            last_called_at: Utc::now(),
            avg_latency_ms: 0.0,
            error_rate: 0.0,
        }
    }

    /// Attach traffic statistics.
    ///
    /// `error_rate` is derived as `error_count / call_count`, 0 when there
    /// were no calls, clamped to [0, 1].
    pub fn with_traffic(mut self, call_count: u64, avg_latency_ms: f64, error_count: u64) -> Self {
        self.call_count = call_count;
        self.avg_latency_ms = avg_latency_ms;
        self.error_rate = error_rate(error_count, call_count);
        self
    }

    /// Set the last-called timestamp.
    pub fn with_last_called_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_called_at = at;
        self
    }

    /// Whether this edge is a self-call.
    pub fn is_self_loop(&self) -> bool {
        self.source_api_id == self.target_api_id
    }
}

/// Error fraction from raw counters.
pub fn error_rate(error_count: u64, call_count: u64) -> f64 {
    if call_count == 0 {
        return 0.0;
    }
    (error_count as f64 / call_count as f64).clamp(0.0, 1.0)
}
