//! The strategy seam §10.6 keeps open: one algorithm is committed to
//! today (fixpoint over SCCs), but the trait boundary leaves room for a
//! future strategy (e.g. bi-abduction) to be dropped in later without the
//! caller changing. Only `FixpointStrategy` is implemented.

use crate::analysis::AnalysisRun;
use crate::graph::DependencyGraph;
use crate::registry::Registry;
use crate::walker::ModuleAnalysis;

/// Performance counters for one analysis run (§10.6's "per-function
/// metrics").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisMetrics {
    pub functions_analyzed: usize,
    /// Number of fixpoint rounds spent, summed across every non-trivial
    /// SCC (trivial SCCs contribute 1 each).
    pub total_rounds: usize,
    /// SCCs that hit the round bound without stabilizing (§4.9, §7
    /// `FixpointDiverged`).
    pub diverged_sccs: usize,
    /// Functions whose final compact effect is `unknown`.
    pub unknown_results: usize,
}

/// Interprocedural analysis strategy over a module dependency graph.
pub trait AnalysisStrategy {
    /// Analyze every function reachable from `modules`, consulting and
    /// extending `registry` with generated effects as it goes.
    fn analyze_all(&self, modules: &[ModuleAnalysis], graph: &DependencyGraph, registry: &mut Registry) -> AnalysisRun;

    fn strategy_name(&self) -> &'static str;

    fn metrics(&self) -> AnalysisMetrics;
}
