//! The effect registry (§3, §4.3): an immutable, process-global store
//! keyed by `(module, function, arity)`.

pub mod call_graph_resolver;
pub mod entry;
pub mod loader;
pub mod protocol_resolver;

use std::collections::{BTreeSet, HashMap};

use ahash::AHashSet;

use crate::domain::{CompactEffect, Mfa};

pub use call_graph_resolver::{CallGraphResolver, RedirectTable, Resolution};
pub use entry::{parse_function_arity, parse_mfa, EffectDescriptor};
pub use loader::EffectLayer;
pub use protocol_resolver::{ProtocolResolver, ReceiverShape};

/// The broad category a compact effect falls into, for the public
/// `effect_category` contract (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCategory {
    File,
    Io,
    Network,
    Process,
    State,
    Ets,
    Time,
    Random,
    Exception,
    Unknown,
}

/// Built once at analysis startup from seed + generated + explicit files,
/// immutable thereafter for the duration of a run (§3 Lifecycles).
pub struct Registry {
    effects: EffectLayer,
    redirects: RedirectTable,
    modules: AHashSet<String>,
    /// Structural calls per function, used as the default call-graph
    /// source when no resolution-file redirect exists (§4.4).
    calls: HashMap<Mfa, BTreeSet<Mfa>>,
}

impl Registry {
    pub fn new(effects: EffectLayer, redirects: RedirectTable, calls: HashMap<Mfa, BTreeSet<Mfa>>) -> Self {
        let modules = effects.keys().map(|mfa| mfa.module.clone()).collect();
        Self { effects, redirects, modules, calls }
    }

    /// `effect_type(mfa) -> token | None`. Falls back to chasing the
    /// call-graph/redirect chain to its bottommost leaves (§4.3, §4.4)
    /// when `mfa` has no direct registry entry of its own — a wrapper
    /// whose effect is wholly determined by its callees is still looked
    /// up successfully this way, rather than appearing unclassified.
    pub fn effect_type(&self, mfa: &Mfa) -> Option<CompactEffect> {
        if let Some(direct) = self.effects.get(mfa) {
            return Some(direct.clone());
        }
        self.effect_type_via_leaves(mfa)
    }

    fn effect_type_via_leaves(&self, mfa: &Mfa) -> Option<CompactEffect> {
        let (leaves, _cycle) = self.resolve_to_leaves(mfa);
        leaves
            .iter()
            .filter(|leaf| *leaf != mfa)
            .filter_map(|leaf| self.effects.get(leaf).cloned())
            .reduce(|acc, next| acc.combine(&next))
    }

    /// `effect_category(mfa) -> one of {...}`.
    pub fn effect_category(&self, mfa: &Mfa) -> Option<EffectCategory> {
        self.effect_type(mfa).map(|effect| match effect {
            CompactEffect::Unknown => EffectCategory::Unknown,
            CompactEffect::Exception(_) => EffectCategory::Exception,
            CompactEffect::Pure | CompactEffect::LambdaDependent | CompactEffect::Nif => EffectCategory::Io,
            CompactEffect::SideEffecting(sites) | CompactEffect::Dependent(sites) => {
                categorize_sites(&sites).unwrap_or(EffectCategory::Io)
            }
        })
    }

    /// `effect_module?(module) -> bool`.
    pub fn effect_module(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn contains(&self, mfa: &Mfa) -> bool {
        self.effects.contains_key(mfa) || self.calls.contains_key(mfa) || self.redirects.contains_key(mfa)
    }

    /// `resolve_to_leaves(mfa) -> Set<MFA>` (§4.3): follows `redirect_to`
    /// chains breadth-first until all reached nodes are terminal.
    pub fn resolve_to_leaves(&self, mfa: &Mfa) -> (BTreeSet<Mfa>, bool) {
        let resolver = CallGraphResolver::new(&self.calls, &self.redirects);
        let known_entries = self.effects.len() + self.calls.len() + self.redirects.len();
        resolver.resolve_to_leaves(mfa, known_entries)
    }

    pub fn record_function(&mut self, mfa: Mfa, effect: CompactEffect) {
        self.modules.insert(mfa.module.clone());
        self.effects.insert(mfa, effect);
    }

    /// Serialize the in-memory registry back to the seed-registry JSON
    /// schema (§10.6 — the merged-registry writer).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Map, Value};
        let mut modules: Map<String, Value> = Map::new();
        for (mfa, effect) in &self.effects {
            let module_entry = modules.entry(mfa.module.clone()).or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(functions) = module_entry {
                let descriptor = entry::EffectDescriptor(effect.clone());
                functions.insert(format!("{}/{}", mfa.function, mfa.arity), serde_json::to_value(descriptor).unwrap());
            }
        }
        Value::Object(modules)
    }
}

fn categorize_sites(sites: &BTreeSet<Mfa>) -> Option<EffectCategory> {
    // Best-effort categorization from the leaf call sites' own module
    // names; a function with no recorded sites falls back to the
    // generic `Io` category rather than guessing further.
    for site in sites {
        let category = match site.module.as_str() {
            "File" => Some(EffectCategory::File),
            "Net" | "HTTPoison" | "Req" => Some(EffectCategory::Network),
            "Process" | "GenServer" | "Task" => Some(EffectCategory::Process),
            "Agent" | "ETS" if site.module == "ETS" => Some(EffectCategory::Ets),
            "Agent" => Some(EffectCategory::State),
            "System" => Some(EffectCategory::Time),
            ":rand" | "Enum" if site.function == "random" => Some(EffectCategory::Random),
            _ => None,
        };
        if category.is_some() {
            return category;
        }
    }
    None
}
