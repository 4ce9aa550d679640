//! Module dependency graph + SCC ordering (§4.6): exactly what the
//! fixed-point driver needs, no more — build from references, compute
//! SCCs via `petgraph::algo::tarjan_scc`, and expose them in
//! reverse-topological (callees-before-callers) order. No
//! centrality/ranking pass is carried here; see DESIGN.md.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::walker::ModuleAnalysis;

/// One strongly-connected component of the module graph, already in
/// reverse-topological position relative to its siblings.
#[derive(Debug, Clone)]
pub struct Scc {
    pub modules: Vec<String>,
}

impl Scc {
    /// A trivial SCC is a single module with no self-loop: it needs no
    /// fixpoint iteration, just one analysis pass (§4.6, §4.9).
    pub fn is_trivial(&self, graph: &DependencyGraph) -> bool {
        if self.modules.len() != 1 {
            return false;
        }
        let m = &self.modules[0];
        !graph.references(m).contains(m)
    }
}

/// Nodes are modules; edges mean "references at least one function of".
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index_of: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// `build(files) -> Graph`, given each file's already-walked
    /// `ModuleAnalysis` (the AST-to-reference extraction step of §4.6 is
    /// shared with the walker — see `walker::analyze_module`).
    pub fn build(analyses: &[ModuleAnalysis]) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();

        for analysis in analyses {
            let idx = graph.add_node(analysis.module.clone());
            index_of.insert(analysis.module.clone(), idx);
        }

        for analysis in analyses {
            let from = index_of[&analysis.module];
            for referenced in &analysis.references {
                // A reference to a module outside the analyzed set is not
                // a graph edge — it resolves through the registry instead
                // (§4.10 "unresolvable module reference").
                if let Some(&to) = index_of.get(referenced) {
                    if from != to || !graph.contains_edge(from, to) {
                        graph.update_edge(from, to, ());
                    }
                }
            }
        }

        Self { graph, index_of }
    }

    pub fn references(&self, module: &str) -> Vec<String> {
        match self.index_of.get(module) {
            Some(&idx) => self.graph.neighbors(idx).map(|n| self.graph[n].clone()).collect(),
            None => Vec::new(),
        }
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.index_of.contains_key(module)
    }

    /// `sort(Graph) -> (List<SCC>, Set<cycles>)`. `tarjan_scc` already
    /// returns components in reverse-topological order (a node's
    /// dependencies appear in components emitted before or within its
    /// own), matching "callees before callers".
    pub fn sccs(&self) -> Vec<Scc> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|component| Scc {
                modules: component.into_iter().map(|idx| self.graph[idx].clone()).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn analysis(name: &str, refs: &[&str]) -> ModuleAnalysis {
        ModuleAnalysis {
            module: name.to_string(),
            functions: Default::default(),
            references: refs.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn acyclic_graph_yields_only_trivial_sccs() {
        let graph = DependencyGraph::build(&[analysis("A", &["B"]), analysis("B", &[])]);
        let sccs = graph.sccs();
        assert_eq!(sccs.len(), 2);
        assert!(sccs.iter().all(|s| s.is_trivial(&graph)));
    }

    #[test]
    fn mutual_recursion_forms_one_nontrivial_scc() {
        let graph = DependencyGraph::build(&[analysis("A", &["B"]), analysis("B", &["A"])]);
        let sccs = graph.sccs();
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].modules.len(), 2);
        assert!(!sccs[0].is_trivial(&graph));
    }

    #[test]
    fn self_loop_makes_singleton_nontrivial() {
        let graph = DependencyGraph::build(&[analysis("A", &["A"])]);
        let sccs = graph.sccs();
        assert_eq!(sccs.len(), 1);
        assert!(!sccs[0].is_trivial(&graph));
    }

    #[test]
    fn reference_to_module_outside_the_input_set_is_dropped_not_errored() {
        let graph = DependencyGraph::build(&[analysis("A", &["Unseen"])]);
        assert!(!graph.contains_module("Unseen"));
        assert_eq!(graph.sccs().len(), 1);
    }
}
