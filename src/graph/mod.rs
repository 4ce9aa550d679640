//! Module dependency graph and SCC ordering (§4.6).

pub mod dependency_graph;

pub use dependency_graph::{DependencyGraph, Scc};
