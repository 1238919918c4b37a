//! In-memory graph source for testing and seeding.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::{ApiNode, CallEdge};
use super::GraphSource;

/// Error type for the in-memory source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemorySourceError {
    /// The source was switched offline.
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// In-memory graph source.
///
/// Rows can be added after construction; the next load sees them. The
/// source can be taken offline to exercise load-failure paths.
#[derive(Debug, Default)]
pub struct InMemoryGraphSource {
    nodes: RwLock<Vec<ApiNode>>,
    edges: RwLock<Vec<CallEdge>>,
    offline: RwLock<Option<String>>,
}

impl InMemoryGraphSource {
    /// Create a new empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source pre-filled with rows.
    pub fn with_rows(nodes: Vec<ApiNode>, edges: Vec<CallEdge>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
            edges: RwLock::new(edges),
            offline: RwLock::new(None),
        }
    }

    /// Add a node row.
    pub fn add_node(&self, node: ApiNode) {
        self.nodes.write().push(node);
    }

    /// Add an edge row.
    pub fn add_edge(&self, edge: CallEdge) {
        self.edges.write().push(edge);
    }

    /// Make every fetch fail with `reason` until [`set_online`](Self::set_online).
    pub fn set_offline(&self, reason: impl Into<String>) {
        *self.offline.write() = Some(reason.into());
    }

    /// Restore normal fetches.
    pub fn set_online(&self) {
        *self.offline.write() = None;
    }

    fn check_online(&self) -> Result<(), InMemorySourceError> {
        match self.offline.read().as_ref() {
            Some(reason) => Err(InMemorySourceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GraphSource for InMemoryGraphSource {
    type Error = InMemorySourceError;

    async fn fetch_nodes(&self) -> Result<Vec<ApiNode>, Self::Error> {
        self.check_online()?;
        Ok(self.nodes.read().clone())
    }

    async fn fetch_edges(&self) -> Result<Vec<CallEdge>, Self::Error> {
        self.check_online()?;
        Ok(self.edges.read().clone())
    }

    async fn is_healthy(&self) -> bool {
        self.offline.read().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_returns_rows() {
        let source = InMemoryGraphSource::new();
        source.add_node(ApiNode::new("a", "GET /a"));
        source.add_node(ApiNode::new("b", "GET /b"));
        source.add_edge(CallEdge::new("e1", "a", "b"));

        assert_eq!(source.fetch_nodes().await.unwrap().len(), 2);
        assert_eq!(source.fetch_edges().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_source_fails() {
        let source = InMemoryGraphSource::with_rows(vec![ApiNode::new("a", "a")], vec![]);
        source.set_offline("maintenance");

        let err = source.fetch_nodes().await.unwrap_err();
        assert!(err.to_string().contains("maintenance"));

        assert!(!source.is_healthy().await);

        source.set_online();
        assert!(source.fetch_nodes().await.is_ok());
        assert!(source.is_healthy().await);
    }
}
