//! First-order unification of types and effect rows (§4.2).

use crate::domain::effects::Effect;
use crate::domain::substitution::Substitution;
use crate::domain::types::{Type, VarId};
use crate::error::{AnalysisError, Span};

pub type UnifyResult = Result<Substitution, AnalysisError>;

/// `unify(t1, t2) -> Result<s, Mismatch>`.
pub fn unify(t1: &Type, t2: &Type, span: &Span) -> UnifyResult {
    use Type::*;
    match (t1, t2) {
        // Identical primitives unify trivially.
        (Int, Int) | (Float, Float) | (Bool, Bool) | (String, String) | (Atom, Atom) | (Any, Any) => {
            Ok(Substitution::empty())
        }

        // `any` is not special-cased further than identity per §3's closed
        // structural sum — it is a ground type like the others.
        (Var(v), t) | (t, Var(v)) => bind_var(*v, t, span),

        (Function { param: p1, effect: e1, result: r1 }, Function { param: p2, effect: e2, result: r2 })
        | (Closure { captured: p1, effect: e1, result: r1 }, Closure { captured: p2, effect: e2, result: r2 }) => {
            let s_param = unify(p1, p2, span)?;
            let e1 = s_param.apply_effect(e1);
            let e2 = s_param.apply_effect(e2);
            let s_effect = unify_effect(&e1, &e2, span)?;
            let s = Substitution::compose(&s_effect, &s_param);
            let r1 = s.apply_type(r1);
            let r2 = s.apply_type(r2);
            let s_result = unify(&r1, &r2, span)?;
            Ok(Substitution::compose(&s_result, &s))
        }

        (Tuple(ts1), Tuple(ts2)) => unify_sequence(ts1, ts2, t1, t2, span),
        (List(a), List(b)) => unify(a, b, span),
        (Map(k1, v1), Map(k2, v2)) => {
            let s_k = unify(k1, k2, span)?;
            let v1 = s_k.apply_type(v1);
            let v2 = s_k.apply_type(v2);
            let s_v = unify(&v1, &v2, span)?;
            Ok(Substitution::compose(&s_v, &s_k))
        }
        (Union(ts1), Union(ts2)) => unify_sequence(ts1, ts2, t1, t2, span),
        (Struct { module: m1, fields: f1 }, Struct { module: m2, fields: f2 }) => {
            if m1 != m2 || f1.len() != f2.len() {
                return Err(AnalysisError::type_mismatch(t1, t2, span.clone()));
            }
            let ts1: Vec<Type> = f1.iter().map(|(_, t)| t.clone()).collect();
            let ts2: Vec<Type> = f2.iter().map(|(_, t)| t.clone()).collect();
            unify_sequence(&ts1, &ts2, t1, t2, span)
        }

        // `forall`: instantiate with fresh vars before unifying — never
        // unify directly under a binder. Callers are expected to
        // instantiate polymorphic schemes via `infer::context` before
        // reaching here; reaching a bare `Forall` in unify is itself an
        // unhandled shape.
        (Forall { .. }, _) | (_, Forall { .. }) => Err(AnalysisError::type_mismatch(t1, t2, span.clone())),

        _ => Err(AnalysisError::type_mismatch(t1, t2, span.clone())),
    }
}

fn unify_sequence(ts1: &[Type], ts2: &[Type], whole1: &Type, whole2: &Type, span: &Span) -> UnifyResult {
    if ts1.len() != ts2.len() {
        return Err(AnalysisError::type_mismatch(whole1, whole2, span.clone()));
    }
    let mut subst = Substitution::empty();
    for (a, b) in ts1.iter().zip(ts2.iter()) {
        let a = subst.apply_type(a);
        let b = subst.apply_type(b);
        let s = unify(&a, &b, span)?;
        subst = Substitution::compose(&s, &subst);
    }
    Ok(subst)
}

fn bind_var(v: VarId, t: &Type, span: &Span) -> UnifyResult {
    if let Type::Var(other) = t {
        if *other == v {
            return Ok(Substitution::empty());
        }
    }
    if occurs_in_type(v, t) {
        return Err(AnalysisError::occurs_check(v, t, span.clone()));
    }
    Ok(Substitution::singleton_type(v, t.clone()))
}

fn occurs_in_type(v: VarId, t: &Type) -> bool {
    match t {
        Type::Var(id) => *id == v,
        Type::Tuple(ts) | Type::Union(ts) => ts.iter().any(|t| occurs_in_type(v, t)),
        Type::List(t) => occurs_in_type(v, t),
        Type::Map(k, val) => occurs_in_type(v, k) || occurs_in_type(v, val),
        Type::Struct { fields, .. } => fields.iter().any(|(_, t)| occurs_in_type(v, t)),
        Type::Function { param, effect, result } | Type::Closure { captured: param, effect, result } => {
            occurs_in_type(v, param) || occurs_in_effect(v, effect) || occurs_in_type(v, result)
        }
        Type::Forall { vars, body } => !vars.contains(&v) && occurs_in_type(v, body),
        _ => false,
    }
}

fn occurs_in_effect(v: VarId, e: &Effect) -> bool {
    e.free_variables().contains(&v)
}

/// `unify_effect(e1, e2) -> Result<s, Mismatch>`.
///
/// Row effects commute up to reordering (§9): find each atom of one side
/// in the other, treat the remainder as a row-variable if either side has
/// one.
pub fn unify_effect(e1: &Effect, e2: &Effect, span: &Span) -> Result<Substitution, AnalysisError> {
    // `unknown` unifies with anything via `unknown`.
    if e1.is_unknown() || e2.is_unknown() {
        return Ok(Substitution::empty());
    }
    // `empty` unifies only with `empty` or a row-variable.
    if e1.is_empty() && e2.is_empty() {
        return Ok(Substitution::empty());
    }
    if let Effect::Var(v) = e1 {
        return bind_effect_var(*v, e2, span);
    }
    if let Effect::Var(v) = e2 {
        return bind_effect_var(*v, e1, span);
    }
    if e1.is_empty() {
        return bind_empty_against(e2, span);
    }
    if e2.is_empty() {
        return bind_empty_against(e1, span);
    }

    unify_rows(e1, e2, span)
}

fn bind_empty_against(e: &Effect, span: &Span) -> Result<Substitution, AnalysisError> {
    // `empty` against a row whose only non-label atom is a single trailing
    // row-variable: that variable must itself resolve to `empty`.
    let atoms = e.flatten();
    let mut subst = Substitution::empty();
    let mut saw_concrete = false;
    for atom in atoms {
        match atom {
            Effect::Var(v) => {
                subst = Substitution::compose(&Substitution::singleton_effect(*v, Effect::Empty), &subst);
            }
            _ => saw_concrete = true,
        }
    }
    if saw_concrete {
        return Err(AnalysisError::effect_mismatch(&Effect::Empty, e, span.clone()));
    }
    Ok(subst)
}

fn bind_effect_var(v: VarId, e: &Effect, span: &Span) -> Result<Substitution, AnalysisError> {
    if let Effect::Var(other) = e {
        if *other == v {
            return Ok(Substitution::empty());
        }
    }
    if occurs_in_effect(v, e) {
        return Err(AnalysisError::occurs_check(v, &Type::Var(v), span.clone()));
    }
    Ok(Substitution::singleton_effect(v, e.clone()))
}

/// Unify two multi-atom rows, ignoring order: every label on the smaller
/// side must be matched on the other; unmatched atoms on the larger side
/// are absorbed into a fresh row-variable bound to the smaller side's
/// remainder, if the smaller side ends in a row-variable; otherwise it is
/// a mismatch.
fn unify_rows(e1: &Effect, e2: &Effect, span: &Span) -> Result<Substitution, AnalysisError> {
    let mut atoms1: Vec<Effect> = e1.flatten().into_iter().cloned().collect();
    let mut atoms2: Vec<Effect> = e2.flatten().into_iter().cloned().collect();

    let var1 = take_row_var(&mut atoms1);
    let var2 = take_row_var(&mut atoms2);

    let mut remaining2 = atoms2.clone();
    for a in &atoms1 {
        if let Some(pos) = remaining2.iter().position(|b| b == a) {
            remaining2.remove(pos);
        }
    }
    let mut remaining1 = atoms1.clone();
    for b in &atoms2 {
        if let Some(pos) = remaining1.iter().position(|a| a == b) {
            remaining1.remove(pos);
        }
    }

    let mut subst = Substitution::empty();

    match (var1, var2) {
        (Some(v1), Some(v2)) => {
            // Each side's row-variable absorbs the other side's leftover
            // atoms.
            let rest2 = rebuild(remaining2);
            let rest1 = rebuild(remaining1);
            subst = Substitution::compose(&Substitution::singleton_effect(v1, rest2), &subst);
            subst = Substitution::compose(&Substitution::singleton_effect(v2, rest1), &subst);
        }
        (Some(v1), None) => {
            if !remaining1.is_empty() {
                return Err(AnalysisError::effect_mismatch(e1, e2, span.clone()));
            }
            subst = Substitution::singleton_effect(v1, rebuild(remaining2));
        }
        (None, Some(v2)) => {
            if !remaining2.is_empty() {
                return Err(AnalysisError::effect_mismatch(e1, e2, span.clone()));
            }
            subst = Substitution::singleton_effect(v2, rebuild(remaining1));
        }
        (None, None) => {
            if !remaining1.is_empty() || !remaining2.is_empty() {
                return Err(AnalysisError::effect_mismatch(e1, e2, span.clone()));
            }
        }
    }

    Ok(subst)
}

fn take_row_var(atoms: &mut Vec<Effect>) -> Option<VarId> {
    let pos = atoms.iter().position(|a| matches!(a, Effect::Var(_)));
    pos.map(|i| match atoms.remove(i) {
        Effect::Var(id) => id,
        _ => unreachable!(),
    })
}

fn rebuild(atoms: Vec<Effect>) -> Effect {
    Effect::combine_many(atoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::effects::Label;

    fn span() -> Span {
        Span::unknown()
    }

    #[test]
    fn identical_primitives_unify_to_empty_subst() {
        let s = unify(&Type::Int, &Type::Int, &span()).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn mismatched_primitives_fail() {
        assert!(unify(&Type::Int, &Type::Bool, &span()).is_err());
    }

    #[test]
    fn var_binds_and_substitution_makes_both_sides_equal() {
        let t1 = Type::Var(1);
        let t2 = Type::List(Box::new(Type::Int));
        let s = unify(&t1, &t2, &span()).unwrap();
        assert_eq!(s.apply_type(&t1), s.apply_type(&t2));
    }

    #[test]
    fn occurs_check_rejects_recursive_binding() {
        let v = Type::Var(1);
        let recursive = Type::List(Box::new(Type::Var(1)));
        assert!(unify(&v, &recursive, &span()).is_err());
    }

    #[test]
    fn function_types_unify_params_effects_and_results() {
        let f1 = Type::function(Type::Var(1), Effect::var(10), Type::Var(2));
        let f2 = Type::function(Type::Int, Effect::single(Label::Io), Type::Bool);
        let s = unify(&f1, &f2, &span()).unwrap();
        assert_eq!(s.apply_type(&Type::Var(1)), Type::Int);
        assert_eq!(s.apply_type(&Type::Var(2)), Type::Bool);
        assert_eq!(s.apply_effect(&Effect::var(10)), Effect::single(Label::Io));
    }

    #[test]
    fn unknown_effect_unifies_with_anything() {
        let s = unify_effect(&Effect::Unknown, &Effect::single(Label::Io), &span()).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn effect_rows_commute() {
        let row_a = Effect::extend(Effect::single(Label::Io), Effect::single(Label::Dependent));
        let row_b = Effect::extend(Effect::single(Label::Dependent), Effect::single(Label::Io));
        assert!(unify_effect(&row_a, &row_b, &span()).is_ok());
    }

    #[test]
    fn empty_only_unifies_with_empty_or_row_var() {
        assert!(unify_effect(&Effect::Empty, &Effect::Empty, &span()).is_ok());
        assert!(unify_effect(&Effect::Empty, &Effect::single(Label::Io), &span()).is_err());
        let s = unify_effect(&Effect::Empty, &Effect::var(5), &span()).unwrap();
        assert_eq!(s.apply_effect(&Effect::var(5)), Effect::Empty);
    }
}
