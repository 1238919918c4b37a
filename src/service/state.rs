//! Shared service state.

use std::sync::Arc;

use crate::cache::{CacheConfig, GraphCache, LruGraphCache};
use crate::graph_service::{GraphService, GraphServiceConfig};
use crate::store::GraphSource;

/// Shared service state.
///
/// Holds the process-wide graph handle and the response cache. Cloning is
/// cheap and every clone sees the same graph.
pub struct ServiceState<S: GraphSource + 'static> {
    /// The lazily-loaded dependency graph.
    pub graph: Arc<GraphService<S>>,
    /// Cache for serialized responses.
    pub cache: Arc<dyn GraphCache>,
}

impl<S: GraphSource + 'static> ServiceState<S> {
    /// Create service state from an existing graph handle and cache.
    pub fn new(graph: Arc<GraphService<S>>, cache: Arc<dyn GraphCache>) -> Self {
        Self { graph, cache }
    }

    /// Create service state around `source`, configured from environment
    /// variables (see [`GraphServiceConfig::from_env`] and
    /// [`CacheConfig::from_env`]).
    pub fn from_env(source: S) -> Self {
        let graph = GraphService::with_config(Arc::new(source), GraphServiceConfig::from_env());
        let cache = LruGraphCache::new(CacheConfig::from_env());
        Self::new(Arc::new(graph), Arc::new(cache))
    }

    /// Depth used when a request does not specify one.
    pub fn default_depth(&self) -> u32 {
        self.graph.config().default_depth
    }
}

impl<S: GraphSource + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryGraphSource;
    use crate::types::ApiNode;

    #[tokio::test]
    async fn test_clones_share_graph() {
        let source = InMemoryGraphSource::with_rows(vec![ApiNode::new("a", "GET /a")], vec![]);
        let state = ServiceState::new(
            Arc::new(GraphService::new(Arc::new(source))),
            Arc::new(LruGraphCache::default()),
        );
        let clone = state.clone();

        state.graph.stats().await.unwrap();
        assert!(clone.graph.loaded_at().is_some());
        assert_eq!(clone.graph.loads_started(), 1);
    }

    #[test]
    fn test_default_depth_from_config() {
        let state = ServiceState::new(
            Arc::new(GraphService::new(Arc::new(InMemoryGraphSource::new()))),
            Arc::new(LruGraphCache::default()),
        );
        assert_eq!(state.default_depth(), 3);
    }
}
