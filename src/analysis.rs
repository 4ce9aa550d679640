//! Per-function analysis result (§3 "Per-function analysis result", §6
//! "Output: per-function analysis") and the aggregate of one full run.

use std::collections::{BTreeSet, HashMap};

use crate::ast::Visibility;
use crate::domain::{Effect, Mfa, Type};
use crate::error::AnalysisError;

/// `{ mfa, type, effect, return_type, calls, visibility, source_line }`
/// (§3). One of these is produced per function per fixpoint iteration;
/// only the last one recorded before a function's result is frozen
/// survives into the final `AnalysisRun` (§3 invariant 1).
#[derive(Debug, Clone)]
pub struct FunctionAnalysis {
    pub mfa: Mfa,
    pub r#type: Type,
    pub effect: Effect,
    pub return_type: Type,
    pub calls: BTreeSet<Mfa>,
    pub visibility: Visibility,
    pub source_line: u32,
}

/// The full output of one analysis run: every function's final result
/// plus every non-fatal diagnostic accumulated along the way (§7's "no
/// error in the core is fatal" policy).
#[derive(Debug, Clone, Default)]
pub struct AnalysisRun {
    pub results: HashMap<Mfa, FunctionAnalysis>,
    pub errors: Vec<AnalysisError>,
}

impl AnalysisRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mfa: &Mfa) -> Option<&FunctionAnalysis> {
        self.results.get(mfa)
    }
}
