//! The closed structural type algebra `T` (§3, §4.1).

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::effects::Effect;

pub type VarId = u64;

/// A structural type. Equality is structural (derived), matching the
/// invariant that unification only ever compares shapes, never identities.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Atom,
    Any,
    Var(VarId),
    Tuple(Vec<Type>),
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct {
        module: String,
        fields: Vec<(String, Type)>,
    },
    Function {
        param: Box<Type>,
        effect: Box<Effect>,
        result: Box<Type>,
    },
    Closure {
        captured: Box<Type>,
        effect: Box<Effect>,
        result: Box<Type>,
    },
    Forall {
        vars: Vec<VarId>,
        body: Box<Type>,
    },
    Union(Vec<Type>),
}

impl Type {
    pub fn function(param: Type, effect: Effect, result: Type) -> Self {
        Type::Function {
            param: Box::new(param),
            effect: Box::new(effect),
            result: Box::new(result),
        }
    }

    pub fn closure(captured: Type, effect: Effect, result: Type) -> Self {
        Type::Closure {
            captured: Box::new(captured),
            effect: Box::new(effect),
            result: Box::new(result),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Float | Type::Bool | Type::String | Type::Atom | Type::Any
        )
    }

    /// Latent effect carried by a function-shaped value, if any.
    pub fn latent_effect(&self) -> Option<&Effect> {
        match self {
            Type::Function { effect, .. } | Type::Closure { effect, .. } => Some(effect),
            _ => None,
        }
    }

    /// `free_variables(t)` from §4.1: type- and effect-variables free in `t`.
    pub fn free_variables(&self) -> FreeVars {
        let mut out = FreeVars::default();
        self.collect_free_variables(&mut out, &BTreeSet::new());
        out
    }

    fn collect_free_variables(&self, out: &mut FreeVars, bound: &BTreeSet<VarId>) {
        match self {
            Type::Int | Type::Float | Type::Bool | Type::String | Type::Atom | Type::Any => {}
            Type::Var(id) => {
                if !bound.contains(id) {
                    out.type_vars.insert(*id);
                }
            }
            Type::Tuple(ts) | Type::Union(ts) => {
                for t in ts {
                    t.collect_free_variables(out, bound);
                }
            }
            Type::List(t) => t.collect_free_variables(out, bound),
            Type::Map(k, v) => {
                k.collect_free_variables(out, bound);
                v.collect_free_variables(out, bound);
            }
            Type::Struct { fields, .. } => {
                for (_, t) in fields {
                    t.collect_free_variables(out, bound);
                }
            }
            Type::Function { param, effect, result } | Type::Closure { captured: param, effect, result } => {
                param.collect_free_variables(out, bound);
                effect.collect_free_variables(out, bound);
                result.collect_free_variables(out, bound);
            }
            Type::Forall { vars, body } => {
                let mut bound = bound.clone();
                bound.extend(vars.iter().copied());
                body.collect_free_variables(out, &bound);
            }
        }
    }

    /// `monomorphic?(t)`: true iff `t` carries no `Forall` binder anywhere.
    pub fn is_monomorphic(&self) -> bool {
        match self {
            Type::Forall { .. } => false,
            Type::Tuple(ts) | Type::Union(ts) => ts.iter().all(Type::is_monomorphic),
            Type::List(t) => t.is_monomorphic(),
            Type::Map(k, v) => k.is_monomorphic() && v.is_monomorphic(),
            Type::Struct { fields, .. } => fields.iter().all(|(_, t)| t.is_monomorphic()),
            Type::Function { param, result, .. } | Type::Closure { captured: param, result, .. } => {
                param.is_monomorphic() && result.is_monomorphic()
            }
            _ => true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FreeVars {
    pub type_vars: BTreeSet<VarId>,
    pub effect_vars: BTreeSet<VarId>,
}

impl FreeVars {
    pub fn is_empty(&self) -> bool {
        self.type_vars.is_empty() && self.effect_vars.is_empty()
    }

    pub fn extend(&mut self, other: FreeVars) {
        self.type_vars.extend(other.type_vars);
        self.effect_vars.extend(other.effect_vars);
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Atom => write!(f, "atom"),
            Type::Any => write!(f, "any"),
            Type::Var(id) => write!(f, "t{id}"),
            Type::Tuple(ts) => {
                write!(f, "{{")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "}}")
            }
            Type::List(t) => write!(f, "[{t}]"),
            Type::Map(k, v) => write!(f, "map({k}, {v})"),
            Type::Struct { module, .. } => write!(f, "%{module}{{}}"),
            Type::Function { param, effect, result } => write!(f, "({param} -[{effect}]-> {result})"),
            Type::Closure { captured, effect, result } => write!(f, "(closure<{captured}> -[{effect}]-> {result})"),
            Type::Forall { vars, body } => write!(f, "forall {vars:?}. {body}"),
            Type::Union(ts) => {
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::effects::Effect;

    #[test]
    fn free_variables_skips_bound_forall_vars() {
        let t = Type::Forall {
            vars: vec![1],
            body: Box::new(Type::Tuple(vec![Type::Var(1), Type::Var(2)])),
        };
        let fv = t.free_variables();
        assert!(!fv.type_vars.contains(&1));
        assert!(fv.type_vars.contains(&2));
    }

    #[test]
    fn monomorphic_detects_forall() {
        let mono = Type::function(Type::Int, Effect::empty(), Type::Bool);
        assert!(mono.is_monomorphic());

        let poly = Type::Forall {
            vars: vec![1],
            body: Box::new(Type::Var(1)),
        };
        assert!(!poly.is_monomorphic());
    }

    #[test]
    fn latent_effect_only_on_function_shapes() {
        assert!(Type::Int.latent_effect().is_none());
        let f = Type::function(Type::Int, Effect::single(crate::domain::effects::Label::Io), Type::Int);
        assert!(f.latent_effect().is_some());
    }
}
