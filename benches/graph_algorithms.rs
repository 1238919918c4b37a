//! Performance benchmarks for the graph algorithms.
//!
//! Run with: `cargo bench --bench graph_algorithms`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Full load (10k nodes) | <250ms | Build + centrality + cycles |
//! | Cycle detection | Linear | Iterative Tarjan |
//! | Bounded BFS (depth 3) | <1ms p99 | Per request |
//! | Cache key | <1µs | xxh64 over endpoint + params |

use criterion::{
    black_box, criterion_group, criterion_main,
    BenchmarkId, Criterion, Throughput,
};

use apiwatch_graph::graph::{critical_path, dependents_bfs};
use apiwatch_graph::{ApiId, ApiNode, CacheKey, CallEdge, LoadedGraph};

/// Deterministic pseudo-random graph: `nodes` endpoints, about four calls each.
fn make_rows(nodes: usize) -> (Vec<ApiNode>, Vec<CallEdge>) {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let api_nodes = (0..nodes)
        .map(|i| ApiNode::new(format!("api-{}", i), format!("GET /svc/{}", i)))
        .collect();

    let edges = (0..nodes * 4)
        .map(|i| {
            let source = next() as usize % nodes;
            let target = next() as usize % nodes;
            CallEdge::new(format!("edge-{}", i), format!("api-{}", source), format!("api-{}", target))
                .with_traffic(next() % 10_000 + 1, 25.0, next() % 10)
        })
        .collect();

    (api_nodes, edges)
}

/// Benchmark a full load: build, centrality and cycle detection.
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    group.sample_size(20);

    for size in [100, 1_000, 10_000] {
        let (nodes, edges) = make_rows(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("nodes", size), &(nodes, edges), |b, (nodes, edges)| {
            b.iter(|| LoadedGraph::build(black_box(nodes.clone()), black_box(edges.clone())))
        });
    }

    group.finish();
}

/// Benchmark cycle detection on an already-built graph.
fn bench_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_cycles");

    for size in [1_000, 10_000] {
        let (nodes, edges) = make_rows(size);
        let loaded = LoadedGraph::build(nodes, edges);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("nodes", size), &loaded, |b, loaded| {
            b.iter(|| black_box(loaded.graph()).detect_cycles())
        });
    }

    group.finish();
}

/// Benchmark per-request queries.
fn bench_queries(c: &mut Criterion) {
    let (nodes, edges) = make_rows(10_000);
    let loaded = LoadedGraph::build(nodes, edges);
    let seed = ApiId::from("api-42");

    let mut group = c.benchmark_group("queries");

    for depth in [1, 3, 5] {
        group.bench_with_input(BenchmarkId::new("dependents_bfs", depth), &depth, |b, &depth| {
            b.iter(|| dependents_bfs(loaded.graph(), black_box(&seed), depth))
        });
    }

    group.sample_size(10);
    group.bench_function("critical_path", |b| {
        b.iter(|| critical_path(black_box(loaded.graph())))
    });

    group.bench_function("page_100", |b| {
        b.iter(|| loaded.page(None, black_box(100)))
    });

    group.finish();
}

/// Benchmark cache key derivation.
fn bench_cache_key(c: &mut Criterion) {
    c.bench_function("cache_key", |b| {
        b.iter(|| {
            CacheKey::new(
                black_box("/api/graph/apis/:api_id/dependents"),
                black_box(&[("apiId", "550e8400-e29b-41d4-a716-446655440000"), ("depth", "3")]),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_load,
    bench_cycles,
    bench_queries,
    bench_cache_key,
);
criterion_main!(benches);
