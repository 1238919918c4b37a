//! Lazily-loaded, shared dependency graph.
//!
//! [`GraphService`] owns the in-memory graph for the whole process. The first
//! query loads every node and edge from a [`GraphSource`], computes
//! centrality and cycles once, and publishes the result as an immutable
//! [`LoadedGraph`]. Later queries read that snapshot without locking.
//!
//! ## Single-flight loading
//!
//! The first caller spawns the load as its own task and publishes a shared
//! handle to it. Every concurrent caller awaits that same handle, so the
//! source is read once whether the load succeeds, fails, or its first caller
//! goes away. A failed load installs nothing and the next call retries.
//!
//! ## Freshness
//!
//! The graph is not updated when new traffic is recorded. It is replaced
//! when [`GraphService::reset`] is called, or on the first query after
//! `max_staleness` has elapsed if that is configured. A stale graph keeps
//! serving until its replacement has loaded; if the reload fails, callers
//! get the stale graph and the next query tries again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::graph::{self, DependencyGraph};
use crate::store::GraphSource;
use crate::types::{
    ApiId, ApiNode, CallEdge, CycleReport, FullChain, GraphPage, GraphStats, SerializedGraph,
    Subgraph, TraversalHit,
};

/// Default traversal depth for dependents/dependencies queries.
pub const DEFAULT_DEPTH: u32 = 3;

/// Configuration for [`GraphService`].
#[derive(Debug, Clone)]
pub struct GraphServiceConfig {
    /// Reload on the next query once the graph is older than this.
    /// `None` keeps the graph until [`GraphService::reset`].
    pub max_staleness: Option<Duration>,
    /// Depth used when a caller does not specify one.
    pub default_depth: u32,
}

impl Default for GraphServiceConfig {
    fn default() -> Self {
        Self {
            max_staleness: None,
            default_depth: DEFAULT_DEPTH,
        }
    }
}

impl GraphServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// - `GRAPH_MAX_STALENESS_SECS` (unset: never reload on age)
    /// - `GRAPH_DEFAULT_DEPTH` (default 3)
    pub fn from_env() -> Self {
        Self {
            max_staleness: std::env::var("GRAPH_MAX_STALENESS_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            default_depth: std::env::var("GRAPH_DEFAULT_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DEPTH),
        }
    }
}

/// Error type for graph service queries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphServiceError {
    /// The graph source could not be read. Retryable.
    #[error("Graph source unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Lifecycle of the shared graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Nothing loaded yet, or the last load failed, or a reset happened.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// A graph is installed.
    Loaded,
}

/// What happened during a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    /// Nodes installed.
    pub node_count: usize,
    /// Edges installed.
    pub edge_count: usize,
    /// Edges skipped because an endpoint was not registered.
    pub rejected_edges: usize,
    /// Wall time from the start of the load to the finished graph, in milliseconds.
    pub elapsed_ms: u64,
}

/// An immutable, fully-computed graph snapshot.
#[derive(Debug)]
pub struct LoadedGraph {
    graph: DependencyGraph,
    cycles: Vec<Vec<ApiId>>,
    loaded_at: DateTime<Utc>,
    loaded_instant: Instant,
    report: LoadReport,
}

impl LoadedGraph {
    /// Build a snapshot from source rows.
    ///
    /// Edges whose endpoints are not among `nodes` are skipped and counted.
    pub fn build(nodes: Vec<ApiNode>, edges: Vec<CallEdge>) -> Self {
        Self::build_since(nodes, edges, Instant::now())
    }

    /// Like [`LoadedGraph::build`], timing the load from `started`.
    fn build_since(nodes: Vec<ApiNode>, edges: Vec<CallEdge>, started: Instant) -> Self {
        let mut graph = DependencyGraph::new();
        for node in nodes {
            graph.add_node(node);
        }

        let mut rejected_edges = 0;
        for edge in edges {
            if let Err(e) = graph.add_edge(edge) {
                tracing::warn!(error = %e, "Skipping dangling dependency edge");
                rejected_edges += 1;
            }
        }

        graph.compute_centrality();
        let cycles = graph.detect_cycles();

        let report = LoadReport {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            rejected_edges,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        Self {
            graph,
            cycles,
            loaded_at: Utc::now(),
            loaded_instant: Instant::now(),
            report,
        }
    }

    /// The graph, with centrality already computed.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Cycles detected at load time.
    pub fn cycles(&self) -> &[Vec<ApiId>] {
        &self.cycles
    }

    /// When the snapshot was built.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Load statistics.
    pub fn report(&self) -> LoadReport {
        self.report
    }

    /// Age of the snapshot.
    pub fn age(&self) -> Duration {
        self.loaded_instant.elapsed()
    }

    /// Node, edge and cycle counts.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            cycle_count: self.cycles.len(),
        }
    }

    /// Copy the whole graph into its transport form.
    pub fn serialize(&self) -> SerializedGraph {
        SerializedGraph::new(
            self.graph.nodes().cloned().collect(),
            self.graph.edges().cloned().collect(),
            self.cycles.len(),
        )
    }

    /// One page of nodes ordered by descending centrality.
    ///
    /// The page starts after `cursor`; an unknown cursor starts from the
    /// top. `next_cursor` is the last id on the page when more remain.
    pub fn page(&self, cursor: Option<&ApiId>, limit: usize) -> GraphPage {
        let SerializedGraph { mut nodes, edges, metadata } = self.serialize();
        nodes.sort_by(|a, b| {
            b.centrality_score
                .total_cmp(&a.centrality_score)
                .then_with(|| a.id.cmp(&b.id))
        });

        let start = cursor
            .and_then(|c| nodes.iter().position(|n| &n.id == c))
            .map(|i| i + 1)
            .unwrap_or(0);
        let end = start.saturating_add(limit).min(nodes.len());
        let next_cursor = if end < nodes.len() && end > start {
            Some(nodes[end - 1].id.clone())
        } else {
            None
        };

        let page = nodes.drain(start.min(end)..end).collect();
        GraphPage {
            nodes: page,
            edges,
            metadata,
            next_cursor,
        }
    }

    /// Cycles with their `A → B → A` descriptions.
    pub fn cycle_report(&self) -> CycleReport {
        CycleReport {
            cycles: self.cycles.clone(),
            descriptions: graph::describe_cycles(&self.graph, &self.cycles),
        }
    }
}

/// Result every caller of one load receives.
type LoadResult = Result<Arc<LoadedGraph>, GraphServiceError>;

/// Handle to a spawned load, cloned by every caller that waits on it.
type LoadHandle = Shared<BoxFuture<'static, LoadResult>>;

struct PendingLoad {
    generation: u64,
    handle: LoadHandle,
}

#[derive(Default)]
struct Slot {
    current: Option<Arc<LoadedGraph>>,
    pending: Option<PendingLoad>,
    generation: u64,
}

/// Process-wide handle to the dependency graph.
///
/// Build one in the composition root and share it (`Arc<GraphService<S>>`).
pub struct GraphService<S: GraphSource> {
    source: Arc<S>,
    config: GraphServiceConfig,
    slot: Arc<RwLock<Slot>>,
    loads_started: AtomicU64,
}

impl<S: GraphSource + 'static> GraphService<S> {
    /// Create a service with default configuration. Nothing is loaded yet.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_config(source, GraphServiceConfig::default())
    }

    /// Create a service with explicit configuration.
    pub fn with_config(source: Arc<S>, config: GraphServiceConfig) -> Self {
        Self {
            source,
            config,
            slot: Arc::new(RwLock::new(Slot::default())),
            loads_started: AtomicU64::new(0),
        }
    }

    /// The service configuration.
    pub fn config(&self) -> &GraphServiceConfig {
        &self.config
    }

    /// The underlying source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Number of loads started since construction.
    pub fn loads_started(&self) -> u64 {
        self.loads_started.load(Ordering::Relaxed)
    }

    /// Current lifecycle state. Never triggers a load.
    ///
    /// A stale graph being refreshed still reports `Loaded`.
    pub fn state(&self) -> LoadState {
        let slot = self.slot.read();
        if slot.current.is_some() {
            LoadState::Loaded
        } else if slot.pending.is_some() {
            LoadState::Loading
        } else {
            LoadState::Unloaded
        }
    }

    /// When the installed graph was built, if one is installed.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.slot.read().current.as_ref().map(|g| g.loaded_at())
    }

    /// Drop the installed graph. The next query reloads from the source.
    ///
    /// Callers already holding a snapshot keep using it. A load still in
    /// flight finishes for its waiters but is not installed.
    pub fn reset(&self) {
        let mut slot = self.slot.write();
        slot.current = None;
        slot.pending = None;
        tracing::info!("Dependency graph reset");
    }

    /// Shared handle to the loaded graph, loading it if needed.
    pub async fn snapshot(&self) -> Result<Arc<LoadedGraph>, GraphServiceError> {
        let (stale, handle) = {
            let mut slot = self.slot.write();
            if let Some(loaded) = &slot.current {
                if !self.is_stale(loaded) {
                    return Ok(Arc::clone(loaded));
                }
            }
            let stale = slot.current.clone();
            (stale, self.join_or_start_load(&mut slot))
        };

        match handle.await {
            Ok(loaded) => Ok(loaded),
            Err(e) => match stale {
                Some(stale) => {
                    tracing::warn!(
                        error = %e,
                        age_ms = stale.age().as_millis() as u64,
                        "Reload failed, serving stale dependency graph"
                    );
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// Upstream callers of `id` within `max_depth` hops.
    pub async fn dependents(
        &self,
        id: &ApiId,
        max_depth: u32,
    ) -> Result<Vec<TraversalHit>, GraphServiceError> {
        let loaded = self.snapshot().await?;
        Ok(graph::dependents_bfs(loaded.graph(), id, max_depth))
    }

    /// Downstream callees of `id` within `max_depth` hops.
    pub async fn dependencies(
        &self,
        id: &ApiId,
        max_depth: u32,
    ) -> Result<Vec<TraversalHit>, GraphServiceError> {
        let loaded = self.snapshot().await?;
        Ok(graph::dependencies_bfs(loaded.graph(), id, max_depth))
    }

    /// Greedy longest chain by centrality.
    pub async fn critical_path(&self) -> Result<Vec<ApiId>, GraphServiceError> {
        let loaded = self.snapshot().await?;
        Ok(graph::critical_path(loaded.graph()))
    }

    /// Every transitive caller and callee of `id`.
    pub async fn full_chain(&self, id: &ApiId) -> Result<FullChain, GraphServiceError> {
        let loaded = self.snapshot().await?;
        Ok(graph::full_chain(loaded.graph(), id))
    }

    /// Deepest upstream caller distance for `id`.
    pub async fn dependency_depth(&self, id: &ApiId) -> Result<u32, GraphServiceError> {
        let loaded = self.snapshot().await?;
        Ok(graph::dependency_depth(loaded.graph(), id))
    }

    /// Node, edge and cycle counts.
    pub async fn stats(&self) -> Result<GraphStats, GraphServiceError> {
        Ok(self.snapshot().await?.stats())
    }

    /// Whole graph with metadata.
    pub async fn serialize(&self) -> Result<SerializedGraph, GraphServiceError> {
        Ok(self.snapshot().await?.serialize())
    }

    /// Centrality-ordered page of nodes.
    pub async fn full_page(
        &self,
        cursor: Option<&ApiId>,
        limit: usize,
    ) -> Result<GraphPage, GraphServiceError> {
        Ok(self.snapshot().await?.page(cursor, limit))
    }

    /// Nodes owned by `team_id` and the edges among them.
    pub async fn team_subgraph(&self, team_id: &str) -> Result<Subgraph, GraphServiceError> {
        let loaded = self.snapshot().await?;
        Ok(loaded.graph().team_subgraph(team_id))
    }

    /// Cycles detected at load time.
    pub async fn cycles(&self) -> Result<Vec<Vec<ApiId>>, GraphServiceError> {
        Ok(self.snapshot().await?.cycles().to_vec())
    }

    /// Cycles with human-readable descriptions.
    pub async fn cycle_report(&self) -> Result<CycleReport, GraphServiceError> {
        Ok(self.snapshot().await?.cycle_report())
    }

    fn is_stale(&self, loaded: &LoadedGraph) -> bool {
        self.config
            .max_staleness
            .map(|max| loaded.age() >= max)
            .unwrap_or(false)
    }

    /// Join the load in flight, or spawn one. Called with the slot locked.
    fn join_or_start_load(&self, slot: &mut Slot) -> LoadHandle {
        if let Some(pending) = &slot.pending {
            return pending.handle.clone();
        }

        if let Some(stale) = &slot.current {
            tracing::info!(age_ms = stale.age().as_millis() as u64, "Dependency graph is stale");
        }

        slot.generation += 1;
        let generation = slot.generation;
        let attempt = self.loads_started.fetch_add(1, Ordering::Relaxed) + 1;
        let source = Arc::clone(&self.source);
        let shared_slot = Arc::clone(&self.slot);

        // The task installs its own result, so it completes even if every
        // caller is dropped.
        let task = tokio::spawn(async move {
            let result = load(source.as_ref(), attempt).await;
            let mut slot = shared_slot.write();
            if slot.pending.as_ref().map(|p| p.generation) == Some(generation) {
                slot.pending = None;
                if let Ok(loaded) = &result {
                    slot.current = Some(Arc::clone(loaded));
                }
            }
            result
        });

        let handle = async move {
            task.await.unwrap_or_else(|e| {
                Err(GraphServiceError::UpstreamUnavailable(format!(
                    "graph load task failed: {}",
                    e
                )))
            })
        }
        .boxed()
        .shared();

        slot.pending = Some(PendingLoad {
            generation,
            handle: handle.clone(),
        });
        handle
    }
}

async fn load<S: GraphSource>(source: &S, attempt: u64) -> LoadResult {
    let started = Instant::now();
    tracing::info!(attempt, "Loading dependency graph");

    let nodes = source.fetch_nodes().await.map_err(upstream)?;
    let edges = source.fetch_edges().await.map_err(upstream)?;

    let loaded = LoadedGraph::build_since(nodes, edges, started);
    let report = loaded.report();

    tracing::info!(
        target: "apiwatch_graph::metrics",
        metric = "graph_load",
        node_count = report.node_count,
        edge_count = report.edge_count,
        rejected_edges = report.rejected_edges,
        cycle_count = loaded.cycles().len(),
        elapsed_ms = report.elapsed_ms,
        "Dependency graph loaded"
    );

    Ok(Arc::new(loaded))
}

fn upstream<E: std::fmt::Display>(e: E) -> GraphServiceError {
    tracing::warn!(
        target: "apiwatch_graph::metrics",
        metric = "graph_load_failed",
        error = %e,
        "Dependency graph load failed"
    );
    GraphServiceError::UpstreamUnavailable(e.to_string())
}
