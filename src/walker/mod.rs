//! AST walker (§4.7): structural extraction only, no effect inference.
//!
//! For each module's AST, produces a `ModuleAnalysis` — a map
//! `mfa -> FunctionShell` plus the set of modules the module references.
//! The per-function `calls` set collected here is exactly what the
//! call-graph resolver (§4.4) consumes; it is never recomputed by a
//! separate traversal.

use std::collections::{BTreeSet, HashMap};

use crate::ast::{Clause, Expr, FunctionDef, Module, Pattern, Visibility};
use crate::domain::Mfa;

/// A single function's shallow structural facts, before any inference.
#[derive(Debug, Clone)]
pub struct FunctionShell {
    pub body: Expr,
    pub parameters: Vec<Pattern>,
    pub visibility: Visibility,
    pub line: u32,
    /// Every call site reachable without descending into nested lambda
    /// bodies being themselves called — i.e. every `QualifiedCall`/
    /// `LocalCall`/`Capture` target syntactically present in the body.
    pub calls: BTreeSet<Mfa>,
}

/// The structural facts extracted from one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleAnalysis {
    pub module: String,
    pub functions: HashMap<(String, u32), FunctionShell>,
    /// Modules referenced via qualified calls and captures.
    pub references: BTreeSet<String>,
}

/// Walk one parsed `Module` into a `ModuleAnalysis`.
///
/// Multiple `def`/`defp` clauses sharing a name and arity — Elixir's
/// idiomatic multi-clause pattern matching, e.g. `def fact(0), do: 1` /
/// `def fact(n), do: n * fact(n - 1)` — are merged into a single
/// `FunctionShell` whose body is a synthetic `Expr::Match` over a tuple
/// of the clauses' own parameter patterns (§4.8's pattern-matching
/// synthesis rule), rather than letting the last textual clause silently
/// overwrite the others in `functions`.
pub fn analyze_module(module: &Module) -> ModuleAnalysis {
    let mut analysis = ModuleAnalysis {
        module: module.name.clone(),
        ..Default::default()
    };

    let mut order: Vec<(String, u32)> = Vec::new();
    let mut groups: HashMap<(String, u32), Vec<&FunctionDef>> = HashMap::new();
    for func in &module.functions {
        let key = (func.name.clone(), func.arity);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(func);
    }

    for key in order {
        let defs = &groups[&key];
        let merged = merge_clauses(&key.0, key.1, defs);

        let mut calls = BTreeSet::new();
        let mut references = BTreeSet::new();
        collect_calls(&merged.body, &module.name, &mut calls, &mut references);
        analysis.references.extend(references);
        analysis.functions.insert(
            key,
            FunctionShell {
                body: merged.body,
                parameters: merged.params,
                visibility: merged.visibility,
                line: merged.line,
                calls,
            },
        );
    }

    analysis
}

/// Collapse same-name/arity clauses into one `FunctionDef`. A single
/// clause passes through unchanged; two or more are rewritten into a
/// synthetic tuple match, one `Clause` per original clause in source
/// order, so multi-clause dispatch is expressed exactly the way
/// `infer::engine::synthesize_match` already expects — no separate
/// merge-aware inference path is needed.
fn merge_clauses(name: &str, arity: u32, defs: &[&FunctionDef]) -> FunctionDef {
    if defs.len() == 1 {
        return defs[0].clone();
    }

    let span = defs[0].body.span().clone();
    let params: Vec<Pattern> = (0..arity).map(|i| Pattern::Var(format!("__clause_arg{i}__"))).collect();
    let scrutinee = Expr::Tuple(
        params
            .iter()
            .map(|p| match p {
                Pattern::Var(var) => Expr::Var(var.clone(), span.clone()),
                _ => unreachable!("synthetic clause params are always Pattern::Var"),
            })
            .collect(),
        span.clone(),
    );

    let clauses: Vec<Clause> = defs
        .iter()
        .map(|def| Clause { pattern: Pattern::Tuple(def.params.clone()), body: def.body.clone() })
        .collect();

    FunctionDef {
        name: name.to_string(),
        arity,
        params,
        body: Expr::Match { scrutinee: Box::new(scrutinee), clauses, span },
        visibility: defs[0].visibility,
        line: defs[0].line,
    }
}

pub fn analyze_modules<'a, I: IntoIterator<Item = &'a Module>>(modules: I) -> Vec<ModuleAnalysis> {
    modules.into_iter().map(analyze_module).collect()
}

fn collect_calls(expr: &Expr, owning_module: &str, calls: &mut BTreeSet<Mfa>, references: &mut BTreeSet<String>) {
    match expr {
        Expr::Literal(..) | Expr::ModuleAlias(..) | Expr::Var(..) => {}
        Expr::QualifiedCall { module, function, args, .. } => {
            calls.insert(Mfa::new(module.clone(), function.clone(), args.len() as u32));
            if module != owning_module {
                references.insert(module.clone());
            }
            for a in args {
                collect_calls(a, owning_module, calls, references);
            }
        }
        Expr::LocalCall { function, args, .. } => {
            calls.insert(Mfa::new(owning_module.to_string(), function.clone(), args.len() as u32));
            for a in args {
                collect_calls(a, owning_module, calls, references);
            }
        }
        Expr::Apply { callee, args, .. } => {
            collect_calls(callee, owning_module, calls, references);
            for a in args {
                collect_calls(a, owning_module, calls, references);
            }
        }
        Expr::Lambda { body, .. } => {
            collect_calls(body, owning_module, calls, references);
        }
        Expr::Capture { module, function, arity, .. } => {
            calls.insert(Mfa::new(module.clone(), function.clone(), *arity));
            if module != owning_module {
                references.insert(module.clone());
            }
        }
        Expr::Let { value, rest, .. } => {
            collect_calls(value, owning_module, calls, references);
            collect_calls(rest, owning_module, calls, references);
        }
        Expr::If { cond, then_branch, else_branch, .. } => {
            collect_calls(cond, owning_module, calls, references);
            collect_calls(then_branch, owning_module, calls, references);
            collect_calls(else_branch, owning_module, calls, references);
        }
        Expr::Match { scrutinee, clauses, .. } => {
            collect_calls(scrutinee, owning_module, calls, references);
            for clause in clauses {
                collect_calls(&clause.body, owning_module, calls, references);
            }
        }
        Expr::Tuple(items, _) | Expr::List(items, _) => {
            for i in items {
                collect_calls(i, owning_module, calls, references);
            }
        }
        Expr::Map(pairs, _) => {
            for (k, v) in pairs {
                collect_calls(k, owning_module, calls, references);
                collect_calls(v, owning_module, calls, references);
            }
        }
        Expr::Binary(segments, _) => {
            for seg in segments {
                collect_calls(&seg.expr, owning_module, calls, references);
            }
        }
        Expr::Block(stmts, _) => {
            for s in stmts {
                collect_calls(s, owning_module, calls, references);
            }
        }
    }
}
