//! API endpoint vertices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered API endpoint.
///
/// Ids come from the persistence layer (UUID strings in production) and are
/// compared as opaque strings. `Ord` gives deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiId(String);

impl ApiId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApiId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ApiId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<uuid::Uuid> for ApiId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Breakage risk assigned by the threat-classification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    /// No known risk.
    Low,
    /// Changed, but not known to break callers.
    Neutral,
    /// Likely to break callers.
    Critical,
}

impl ThreatLevel {
    /// Parse threat level from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "NEUTRAL" => Some(Self::Neutral),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl Default for ThreatLevel {
    fn default() -> Self {
        Self::Low
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A registered API endpoint: one vertex of the dependency graph.
///
/// `in_degree`, `out_degree` and `centrality_score` are derived. They are
/// only accurate right after [`DependencyGraph::compute_centrality`] and go
/// stale on the next mutation.
///
/// [`DependencyGraph::compute_centrality`]: crate::graph::DependencyGraph::compute_centrality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNode {
    /// Unique endpoint identifier.
    pub id: ApiId,
    /// Owning repository.
    pub repo_id: String,
    /// Owning team.
    pub team_id: String,
    /// Owning squad.
    pub squad_id: String,
    /// Deployment location.
    pub location_id: String,
    /// Display label, usually `"{METHOD} {path}"`.
    pub label: String,
    /// Number of distinct callers present in the graph.
    pub in_degree: u32,
    /// Number of distinct callees present in the graph.
    pub out_degree: u32,
    /// Relative structural importance (see [`crate::graph::centrality`]).
    pub centrality_score: f64,
    /// Breakage risk.
    pub threat_level: ThreatLevel,
}

impl ApiNode {
    /// Create a node with empty ownership fields and zeroed derived fields.
    pub fn new(id: impl Into<ApiId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo_id: String::new(),
            team_id: String::new(),
            squad_id: String::new(),
            location_id: String::new(),
            label: label.into(),
            in_degree: 0,
            out_degree: 0,
            centrality_score: 0.0,
            threat_level: ThreatLevel::default(),
        }
    }

    /// Set ownership attributes.
    pub fn with_owner(
        mut self,
        repo_id: impl Into<String>,
        team_id: impl Into<String>,
        squad_id: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Self {
        self.repo_id = repo_id.into();
        self.team_id = team_id.into();
        self.squad_id = squad_id.into();
        self.location_id = location_id.into();
        self
    }

    /// Set the threat level.
    pub fn with_threat_level(mut self, threat_level: ThreatLevel) -> Self {
        self.threat_level = threat_level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_level_roundtrip() {
        for level in [ThreatLevel::Low, ThreatLevel::Neutral, ThreatLevel::Critical] {
            assert_eq!(ThreatLevel::from_str(&level.to_string()), Some(level));
        }
        assert_eq!(ThreatLevel::from_str("critical"), Some(ThreatLevel::Critical));
        assert_eq!(ThreatLevel::from_str("severe"), None);
    }

    #[test]
    fn test_node_wire_format_is_camel_case() {
        let node = ApiNode::new("a", "GET /users").with_owner("r1", "t1", "s1", "l1");
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["id"], "a");
        assert_eq!(json["teamId"], "t1");
        assert_eq!(json["centralityScore"], 0.0);
        assert_eq!(json["threatLevel"], "LOW");
    }
}
