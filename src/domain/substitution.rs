//! Idempotent substitutions over types and effect variables (§3, §4.2).

use std::collections::HashMap;

use crate::domain::effects::Effect;
use crate::domain::types::{Type, VarId};

#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Type(Type),
    Effect(Effect),
}

/// A finite map from variable identifiers to types/effects. Construction
/// via `singleton`/`compose` is the only supported path, so every
/// `Substitution` in circulation is idempotent by construction (applying
/// `compose` eagerly substitutes `s1` into the range of `s2`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    bindings: HashMap<VarId, Binding>,
}

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// `singleton(var, t) -> s`. Caller is responsible for having already
    /// occurs-checked `var` against `t` (unify.rs does this before calling).
    pub fn singleton_type(var: VarId, t: Type) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(var, Binding::Type(t));
        Self { bindings }
    }

    pub fn singleton_effect(var: VarId, e: Effect) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(var, Binding::Effect(e));
        Self { bindings }
    }

    /// `compose(s1, s2) -> s`: apply `s1` to the range of `s2`, then union
    /// with entries of `s1` whose variable is not in `dom(s2)`.
    pub fn compose(s1: &Substitution, s2: &Substitution) -> Substitution {
        let mut out: HashMap<VarId, Binding> = s2
            .bindings
            .iter()
            .map(|(var, binding)| {
                let applied = match binding {
                    Binding::Type(t) => Binding::Type(s1.apply_type(t)),
                    Binding::Effect(e) => Binding::Effect(s1.apply_effect(e)),
                };
                (*var, applied)
            })
            .collect();

        for (var, binding) in &s1.bindings {
            out.entry(*var).or_insert_with(|| binding.clone());
        }

        Substitution { bindings: out }
    }

    pub fn apply_type(&self, t: &Type) -> Type {
        match t {
            Type::Int | Type::Float | Type::Bool | Type::String | Type::Atom | Type::Any => t.clone(),
            Type::Var(id) => match self.bindings.get(id) {
                Some(Binding::Type(replacement)) => self.apply_type(replacement),
                _ => t.clone(),
            },
            Type::Tuple(ts) => Type::Tuple(ts.iter().map(|t| self.apply_type(t)).collect()),
            Type::Union(ts) => Type::Union(ts.iter().map(|t| self.apply_type(t)).collect()),
            Type::List(inner) => Type::List(Box::new(self.apply_type(inner))),
            Type::Map(k, v) => Type::Map(Box::new(self.apply_type(k)), Box::new(self.apply_type(v))),
            Type::Struct { module, fields } => Type::Struct {
                module: module.clone(),
                fields: fields.iter().map(|(name, t)| (name.clone(), self.apply_type(t))).collect(),
            },
            Type::Function { param, effect, result } => Type::Function {
                param: Box::new(self.apply_type(param)),
                effect: Box::new(self.apply_effect(effect)),
                result: Box::new(self.apply_type(result)),
            },
            Type::Closure { captured, effect, result } => Type::Closure {
                captured: Box::new(self.apply_type(captured)),
                effect: Box::new(self.apply_effect(effect)),
                result: Box::new(self.apply_type(result)),
            },
            Type::Forall { vars, body } => {
                // Applying under a binder shadows `vars`: remove them from
                // the substitution before recursing so a captured free
                // variable in the substitution's range can't leak in.
                let shadowed = self.without(vars);
                Type::Forall {
                    vars: vars.clone(),
                    body: Box::new(shadowed.apply_type(body)),
                }
            }
        }
    }

    pub fn apply_effect(&self, e: &Effect) -> Effect {
        match e {
            Effect::Empty | Effect::Unknown => e.clone(),
            Effect::Label(_, _) => e.clone(),
            Effect::Var(id) => match self.bindings.get(id) {
                Some(Binding::Effect(replacement)) => self.apply_effect(replacement),
                _ => e.clone(),
            },
            Effect::Row { head, tail } => Effect::Row {
                head: Box::new(self.apply_effect(head)),
                tail: Box::new(self.apply_effect(tail)),
            },
        }
    }

    fn without(&self, vars: &[VarId]) -> Substitution {
        let mut bindings = self.bindings.clone();
        for v in vars {
            bindings.remove(v);
        }
        Substitution { bindings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::effects::Label;

    #[test]
    fn compose_with_empty_is_identity() {
        let s = Substitution::singleton_type(1, Type::Int);
        let empty = Substitution::empty();
        assert_eq!(Substitution::compose(&empty, &s), s);
        assert_eq!(Substitution::compose(&s, &empty), s);
    }

    #[test]
    fn apply_is_idempotent() {
        let s = Substitution::singleton_type(1, Type::Tuple(vec![Type::Int, Type::Var(2)]));
        let once = s.apply_type(&Type::Var(1));
        let twice = s.apply_type(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn apply_shadows_forall_bound_vars() {
        let s = Substitution::singleton_type(1, Type::Bool);
        let scheme = Type::Forall {
            vars: vec![1],
            body: Box::new(Type::Var(1)),
        };
        assert_eq!(s.apply_type(&scheme), scheme);
    }

    #[test]
    fn compose_chains_effect_substitutions() {
        let s1 = Substitution::singleton_effect(2, Effect::single(Label::Io));
        let s2 = Substitution::singleton_effect(1, Effect::var(2));
        let composed = Substitution::compose(&s1, &s2);
        assert_eq!(composed.apply_effect(&Effect::var(1)), Effect::single(Label::Io));
    }

    fn simple_type() -> impl proptest::strategy::Strategy<Value = Type> {
        use proptest::prelude::*;
        prop_oneof![Just(Type::Int), Just(Type::Bool), Just(Type::String), (0u64..20).prop_map(Type::Var),]
    }

    proptest::proptest! {
        /// §8 round-trip law: applying a substitution a second time to its
        /// own output must be a no-op — a substitution never "keeps going"
        /// on a variable it already replaced.
        #[test]
        fn apply_type_is_idempotent(var in 0u64..5, replacement in simple_type()) {
            let s = Substitution::singleton_type(var, replacement);
            let probe = Type::Tuple(vec![Type::Var(var), Type::Int, Type::Var(var + 1000)]);
            let once = s.apply_type(&probe);
            let twice = s.apply_type(&once);
            proptest::prop_assert_eq!(once, twice);
        }

        /// §8: `compose(empty, s) == compose(s, empty) == s` for any `s`.
        #[test]
        fn compose_with_empty_is_identity(var in 0u64..20, replacement in simple_type()) {
            let s = Substitution::singleton_type(var, replacement);
            let empty = Substitution::empty();
            proptest::prop_assert_eq!(Substitution::compose(&empty, &s), s.clone());
            proptest::prop_assert_eq!(Substitution::compose(&s, &empty), s);
        }
    }
}
