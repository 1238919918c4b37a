//! The dependency graph and the algorithms that run over it.

pub mod dependency;
pub mod cycles;
pub mod centrality;
pub mod traversal;
pub mod critical_path;

pub use dependency::{DependencyGraph, GraphError};
pub use cycles::{describe_cycle, describe_cycles, detect_cycles, find_sccs, sccs_to_cycles};
pub use centrality::{compute_centrality, transitive_in_degree, CentralityScores};
pub use traversal::{bounded_bfs, dependencies_bfs, dependents_bfs, full_chain, reachable, Direction};
pub use critical_path::{critical_path, dependency_depth};
