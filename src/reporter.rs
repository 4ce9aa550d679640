//! The analysis-result reporter (§6 "Output: per-function analysis" and
//! "Output: optional merged effect registry"): converts an in-memory
//! `AnalysisRun` into the JSON shapes external callers consume. `Type`
//! and `Effect` are not themselves `Serialize` (they carry recursive
//! unification variables that only make sense mid-inference), so this
//! module projects each frozen result down to display strings and the
//! registry's own compact-token schema rather than serializing the
//! domain types directly.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::analysis::AnalysisRun;
use crate::ast::Visibility;
use crate::domain::Mfa;
use crate::registry::Registry;

/// One function's reported result (§6): the schema mirrors the registry
/// entry schema plus the type fields the inference engine adds.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionReport {
    pub module: String,
    pub function: String,
    pub arity: u32,
    pub r#type: String,
    pub return_type: String,
    pub effect: String,
    pub compact_effect: char,
    pub calls: Vec<String>,
    pub visibility: &'static str,
    pub line: u32,
}

/// One non-fatal diagnostic, flattened for external consumption (§7:
/// "no error in the core is fatal" — these are informational only).
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub kind: String,
    pub message: String,
    pub span: Option<String>,
}

/// The full reported output of one run: every function's frozen result,
/// in deterministic `(module, function, arity)` order, plus every
/// diagnostic accumulated along the way.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub functions: Vec<FunctionReport>,
    pub diagnostics: Vec<DiagnosticReport>,
}

/// Project a frozen `AnalysisRun` into its reportable form (§6 "Output:
/// per-function analysis").
pub fn report(run: &AnalysisRun) -> RunReport {
    let mut functions: BTreeMap<(String, String, u32), FunctionReport> = BTreeMap::new();

    for analysis in run.results.values() {
        let compact = analysis.effect.to_compact();
        let key = (analysis.mfa.module.clone(), analysis.mfa.function.clone(), analysis.mfa.arity);
        functions.insert(
            key,
            FunctionReport {
                module: analysis.mfa.module.clone(),
                function: analysis.mfa.function.clone(),
                arity: analysis.mfa.arity,
                r#type: analysis.r#type.to_string(),
                return_type: analysis.return_type.to_string(),
                effect: analysis.effect.to_string(),
                compact_effect: compact.letter(),
                calls: analysis.calls.iter().map(Mfa::to_string).collect(),
                visibility: visibility_str(analysis.visibility),
                line: analysis.source_line,
            },
        );
    }

    let diagnostics = run
        .errors
        .iter()
        .map(|e| DiagnosticReport {
            kind: e.kind.to_string(),
            message: e.message.clone(),
            span: e.span.as_ref().map(|s| s.to_string()),
        })
        .collect();

    RunReport { functions: functions.into_values().collect(), diagnostics }
}

/// Serialize a report to the external JSON shape (§6).
pub fn report_to_json(run: &AnalysisRun) -> Value {
    serde_json::to_value(report(run)).expect("RunReport serialization cannot fail")
}

/// Project the final registry back to the seed-registry JSON schema
/// (§6 "Output: optional merged effect registry") — delegates to
/// `Registry::to_json`, which already knows the layered-file shape.
pub fn merged_registry_to_json(registry: &Registry) -> Value {
    registry.to_json()
}

fn visibility_str(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public",
        Visibility::Private => "private",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::analysis::FunctionAnalysis;
    use crate::domain::{Effect, Type};
    use crate::error::AnalysisError;

    #[test]
    fn reports_a_pure_function_with_compact_token() {
        let mut run = AnalysisRun::new();
        let mfa = Mfa::new("M", "f", 1);
        run.results.insert(
            mfa.clone(),
            FunctionAnalysis {
                mfa: mfa.clone(),
                r#type: Type::function(Type::Int, Effect::empty(), Type::Int),
                effect: Effect::empty(),
                return_type: Type::Int,
                calls: BTreeSet::new(),
                visibility: Visibility::Public,
                source_line: 3,
            },
        );

        let report = report(&run);
        assert_eq!(report.functions.len(), 1);
        assert_eq!(report.functions[0].compact_effect, 'p');
        assert_eq!(report.functions[0].module, "M");
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn json_projection_round_trips_through_serde_value() {
        let run = AnalysisRun::new();
        let value = report_to_json(&run);
        assert_eq!(value["functions"], serde_json::json!([]));
        assert_eq!(value["diagnostics"], serde_json::json!([]));
    }

    #[test]
    fn diagnostics_carry_kind_and_message() {
        let mut run = AnalysisRun::new();
        run.errors.push(AnalysisError::fixpoint_diverged(0));
        let report = report(&run);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, "fixpoint diverged");
    }
}
