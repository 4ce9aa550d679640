//! effectlang-analyzer — a static effect and purity analyzer for a
//! dynamically-typed, BEAM-hosted functional language.
//!
//! Layout, leaves first:
//! - `domain`    : types & effects algebra, substitution, unification (§4.1-4.2)
//! - `ast`       : the language-neutral expression tree the parser produces
//! - `parsing`   : source text to `ast::Module` (tree-sitter grammar, §6)
//! - `walker`    : structural extraction — function shells and call sites (§4.7)
//! - `graph`     : module dependency graph and Tarjan SCCs (§4.6)
//! - `registry`  : layered effect registry, call-graph and protocol resolvers (§4.3-4.5)
//! - `infer`     : bidirectional type-and-effect inference engine (§4.8)
//! - `fixpoint`  : interprocedural driver over SCCs (§4.9)
//! - `analysis`  : the per-function and per-run result records (§3)
//! - `reporter`  : projecting a run into the external JSON shapes (§6)
//! - `config`    : run-time knobs (§5, §9)
//! - `source`    : source-file enumeration (§6)
//! - `error`     : the unified diagnostic type threaded through every stage (§7)

#![allow(clippy::too_many_arguments)]

pub mod analysis;
pub mod ast;
pub mod config;
pub mod domain;
pub mod error;
pub mod fixpoint;
pub mod graph;
pub mod infer;
pub mod parsing;
pub mod registry;
pub mod reporter;
pub mod source;
pub mod walker;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use analysis::AnalysisRun;
use config::Config;
use domain::{CompactEffect, Mfa};
use error::AnalysisResult;
use fixpoint::{AnalysisMetrics, AnalysisStrategy, FixpointStrategy};
use graph::DependencyGraph;
use parsing::{BatchParser, TreeSitterParser};
use registry::{loader, EffectLayer, RedirectTable, Registry};
use walker::ModuleAnalysis;

/// The three registry-layer files an analysis run may draw from (§6):
/// a shipped seed layer, a previous run's generated layer, and a
/// hand-maintained explicit-override layer. All three are optional on
/// disk — a missing path is treated as an empty layer, not an error.
#[derive(Debug, Clone, Default)]
pub struct RegistryInputs {
    pub seed_path: Option<std::path::PathBuf>,
    pub generated_path: Option<std::path::PathBuf>,
    pub explicit_path: Option<std::path::PathBuf>,
    pub resolution_path: Option<std::path::PathBuf>,
}

/// One complete analysis run: the frozen per-function results, the
/// merged registry they were produced against, and the strategy's
/// performance counters (§5 "Shared resources", §10.6).
pub struct PipelineOutcome {
    pub run: AnalysisRun,
    pub registry: Registry,
    pub metrics: AnalysisMetrics,
}

/// Ties every stage of the system overview's control flow together:
/// `files → ASTs → dependency graph → SCC order → fixpoint → merged
/// registry`, threading a single input through a fixed sequence of
/// config-gated stages. Only one concrete parser and one concrete
/// strategy exist today (the strategy seam is `fixpoint::AnalysisStrategy`,
/// kept open in case a second implementation is ever added), so this is a
/// plain struct rather than generic over port type parameters.
pub struct Pipeline {
    parser: TreeSitterParser,
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { parser: TreeSitterParser::new(), config }
    }

    /// Enumerate `root` for source files, parse, walk, build the
    /// dependency graph, load the registry layers named by `inputs`, and
    /// run the fixed-point driver to completion.
    pub fn analyze_directory(&self, root: &Path, inputs: &RegistryInputs) -> AnalysisResult<PipelineOutcome> {
        let files = source::enumerate_sources(root, &["ex", "exs"])?;
        let sources: Vec<(&str, &str)> =
            files.iter().map(|f| (f.path.to_str().unwrap_or_default(), f.text.as_str())).collect();
        self.analyze_sources(sources, inputs)
    }

    /// Run the same pipeline over an already-collected `(file_path,
    /// text)` set — the in-memory entry point `tests/` uses directly,
    /// and the one `analyze_directory` delegates to after enumeration.
    pub fn analyze_sources(
        &self,
        sources: Vec<(&str, &str)>,
        inputs: &RegistryInputs,
    ) -> AnalysisResult<PipelineOutcome> {
        let parsed = self.parser.parse_all(sources);

        let mut modules = Vec::new();
        let mut parse_errors = Vec::new();
        for file in parsed {
            parse_errors.extend(file.errors);
            modules.extend(file.modules);
        }

        let mut outcome = self.analyze_modules(modules, inputs)?;
        outcome.run.errors.extend(parse_errors);
        Ok(outcome)
    }

    /// Run the pipeline over already-parsed modules, skipping the
    /// source-enumeration and parsing stages entirely — the entry point
    /// for callers (and tests) that construct an `ast::Module` tree
    /// directly rather than through the tree-sitter grammar.
    pub fn analyze_modules(&self, modules: Vec<ast::Module>, inputs: &RegistryInputs) -> AnalysisResult<PipelineOutcome> {
        let analyses: Vec<ModuleAnalysis> = walker::analyze_modules(&modules);
        let graph = DependencyGraph::build(&analyses);
        let calls = aggregate_calls(&analyses);

        let seed = load_seed_layer(inputs.seed_path.as_deref())?;
        let generated = load_layer_or_empty(inputs.generated_path.as_deref())?;
        let explicit = load_layer_or_empty(inputs.explicit_path.as_deref())?;
        let effects = loader::merge_layers(&seed, &generated, &explicit);

        let redirects = if self.config.load_resolution_file {
            load_redirects_or_empty(inputs.resolution_path.as_deref())?
        } else {
            RedirectTable::new()
        };

        let mut registry = Registry::new(effects, redirects, calls);

        let strategy = FixpointStrategy::new(self.config.max_fixpoint_rounds);
        let run = strategy.analyze_all(&analyses, &graph, &mut registry);

        Ok(PipelineOutcome { run, registry, metrics: strategy.metrics() })
    }
}

fn aggregate_calls(analyses: &[ModuleAnalysis]) -> HashMap<Mfa, BTreeSet<Mfa>> {
    let mut calls = HashMap::new();
    for module in analyses {
        for ((name, arity), shell) in &module.functions {
            calls.insert(Mfa::new(module.module.clone(), name.clone(), *arity), shell.calls.clone());
        }
    }
    calls
}

/// The shipped seed layer (§6 "Input: seed registry file") — a baseline
/// classification of bottommost standard-library functions, embedded so
/// the pipeline works without any file on disk. A caller naming an
/// explicit `seed_path` opts out of the embedded default entirely, even
/// if that path doesn't exist, rather than silently falling back to it.
const DEFAULT_SEED_REGISTRY: &str = include_str!("../data/seed_registry.json");

/// The embedded seed layer, parsed once and reused for every run that
/// doesn't name an explicit `seed_path` — `analyze_directory`/
/// `analyze_sources` may be called many times in one process (e.g. one
/// per workspace app in a multi-app umbrella), and re-parsing the same
/// JSON text on each call would be pure waste.
static DEFAULT_SEED_LAYER: once_cell::sync::Lazy<EffectLayer> = once_cell::sync::Lazy::new(|| {
    loader::parse_layer(DEFAULT_SEED_REGISTRY).expect("embedded seed registry must parse")
});

fn load_seed_layer(path: Option<&Path>) -> AnalysisResult<EffectLayer> {
    match path {
        Some(path) if path.exists() => loader::load_layer_file(path),
        Some(_) => Ok(EffectLayer::new()),
        None => Ok(DEFAULT_SEED_LAYER.clone()),
    }
}

fn load_layer_or_empty(path: Option<&Path>) -> AnalysisResult<EffectLayer> {
    match path {
        Some(path) if path.exists() => loader::load_layer_file(path),
        _ => Ok(EffectLayer::new()),
    }
}

fn load_redirects_or_empty(path: Option<&Path>) -> AnalysisResult<RedirectTable> {
    let Some(path) = path else { return Ok(RedirectTable::new()) };
    if !path.exists() {
        return Ok(RedirectTable::new());
    }
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let mut table = RedirectTable::new();
    let Some(modules) = value.as_object() else { return Ok(table) };
    for (module, functions) in modules {
        if module == "_metadata" {
            continue;
        }
        let Some(functions) = functions.as_object() else { continue };
        for (function_arity, callees) in functions {
            let Some((function, arity)) = registry::parse_function_arity(function_arity) else { continue };
            let Some(callees) = callees.as_array() else { continue };
            let resolved: Vec<Mfa> = callees.iter().filter_map(|v| v.as_str()).filter_map(registry::parse_mfa).collect();
            table.insert(Mfa::new(module.clone(), function, arity), resolved);
        }
    }
    Ok(table)
}

/// Convenience constant mirroring the default effect marker for a fresh
/// leaf function the registry has never seen — exposed for callers that
/// want to seed an empty registry without a file on disk.
pub const UNCLASSIFIED: CompactEffect = CompactEffect::Unknown;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzes_a_single_pure_function_end_to_end() {
        let pipeline = Pipeline::new(Config::default());
        let source = "defmodule M do\n  def f(x) do\n    x + 1\n  end\nend\n";
        let outcome = pipeline.analyze_sources(vec![("m.ex", source)], &RegistryInputs::default()).unwrap();

        let result = outcome.run.get(&Mfa::new("M", "f", 1)).expect("f/1 analyzed");
        assert_eq!(result.effect.to_compact(), CompactEffect::Pure);
    }

    #[test]
    fn empty_source_set_returns_empty_result_without_errors() {
        let pipeline = Pipeline::new(Config::default());
        let outcome = pipeline.analyze_sources(Vec::new(), &RegistryInputs::default()).unwrap();
        assert!(outcome.run.results.is_empty());
        assert!(outcome.run.errors.is_empty());
    }

    #[test]
    fn missing_registry_files_are_treated_as_empty_layers() {
        let inputs = RegistryInputs {
            seed_path: Some(std::path::PathBuf::from("/nonexistent/seed.json")),
            ..Default::default()
        };
        let pipeline = Pipeline::new(Config::default());
        let source = "defmodule M do\n  def f(x) do\n    x\n  end\nend\n";
        let outcome = pipeline.analyze_sources(vec![("m.ex", source)], &inputs).unwrap();
        assert!(outcome.run.get(&Mfa::new("M", "f", 1)).is_some());
    }
}
