//! Inference context (§4.8): a scope-stacked environment plus a
//! fresh-variable generator. Entirely local to one function's inference
//! invocation — discarded once that function's result is finalized (§3
//! Lifecycles), so no process-wide counter is required.

use rustc_hash::FxHashMap;

use crate::domain::substitution::Substitution;
use crate::domain::types::{Type, VarId};

/// Scope-local binding map. This is rebuilt on every `push_scope` during
/// inference and walked on every `lookup`/`free_in_scope` call — a hot
/// enough path per function body that the default SipHash is wasted
/// work, so `rustc-hash`'s FxHash backs it instead (§4.8).
type Scope = FxHashMap<String, Type>;

pub struct Context {
    scopes: Vec<Scope>,
    next_var: VarId,
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            next_var: 0,
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, scheme: Type) {
        self.scopes.last_mut().expect("at least one scope").insert(name.into(), scheme);
    }

    /// Look up a variable, returning the *scheme* as stored (possibly a
    /// `Forall`) — callers instantiate it themselves via `instantiate`.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn fresh_var(&mut self) -> VarId {
        let id = self.next_var;
        self.next_var += 1;
        id
    }

    pub fn fresh_type(&mut self) -> Type {
        Type::Var(self.fresh_var())
    }

    pub fn fresh_effect(&mut self) -> crate::domain::effects::Effect {
        crate::domain::effects::Effect::var(self.fresh_var())
    }

    /// Variables bound anywhere currently in scope, used by
    /// `generalize` to avoid quantifying over anything still reachable
    /// from an enclosing binding.
    pub fn free_in_scope(&self) -> crate::domain::types::FreeVars {
        let mut out = crate::domain::types::FreeVars::default();
        for scope in &self.scopes {
            for t in scope.values() {
                out.extend(t.free_variables());
            }
        }
        out
    }

    /// `instantiate(scheme)`: replace a `Forall`'s bound variables with
    /// fresh ones throughout its body. A non-scheme type is returned
    /// unchanged.
    pub fn instantiate(&mut self, scheme: &Type) -> Type {
        let Type::Forall { vars, body } = scheme else {
            return scheme.clone();
        };
        let free = body.free_variables();
        let mut subst = Substitution::empty();
        for v in vars {
            let fresh = self.fresh_var();
            let step = if free.type_vars.contains(v) {
                Substitution::singleton_type(*v, Type::Var(fresh))
            } else if free.effect_vars.contains(v) {
                Substitution::singleton_effect(*v, crate::domain::effects::Effect::var(fresh))
            } else {
                continue;
            };
            subst = Substitution::compose(&step, &subst);
        }
        subst.apply_type(body)
    }

    /// `generalize(t)`: quantify over every variable free in `t` but not
    /// free anywhere already bound in `self` (let-polymorphism, only
    /// applied to pure right-hand sides — §4.8, §4.9 value restriction).
    pub fn generalize(&self, t: &Type) -> Type {
        let free_t = t.free_variables();
        let free_ctx = self.free_in_scope();
        let mut vars: Vec<VarId> = free_t
            .type_vars
            .iter()
            .chain(free_t.effect_vars.iter())
            .filter(|v| !free_ctx.type_vars.contains(v) && !free_ctx.effect_vars.contains(v))
            .copied()
            .collect();
        vars.sort_unstable();
        vars.dedup();
        if vars.is_empty() {
            t.clone()
        } else {
            Type::Forall { vars, body: Box::new(t.clone()) }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_scopes_innermost_first() {
        let mut ctx = Context::new();
        ctx.bind("x", Type::Int);
        ctx.push_scope();
        ctx.bind("x", Type::Bool);
        assert_eq!(ctx.lookup("x"), Some(&Type::Bool));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("x"), Some(&Type::Int));
    }

    #[test]
    fn fresh_vars_are_monotonically_distinct() {
        let mut ctx = Context::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        assert_ne!(a, b);
    }

    #[test]
    fn instantiate_replaces_bound_vars_with_fresh_ones() {
        let mut ctx = Context::new();
        let scheme = Type::Forall { vars: vec![0], body: Box::new(Type::List(Box::new(Type::Var(0)))) };
        let t1 = ctx.instantiate(&scheme);
        let t2 = ctx.instantiate(&scheme);
        assert_ne!(t1, t2, "two instantiations should get distinct fresh variables");
    }

    #[test]
    fn generalize_only_quantifies_over_vars_not_free_in_enclosing_scope() {
        let mut ctx = Context::new();
        ctx.bind("captured", Type::Var(1));
        let t = Type::Tuple(vec![Type::Var(1), Type::Var(2)]);
        let scheme = ctx.generalize(&t);
        match scheme {
            Type::Forall { vars, .. } => assert_eq!(vars, vec![2]),
            other => panic!("expected Forall, got {other:?}"),
        }
    }
}
