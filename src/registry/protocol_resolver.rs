//! Protocol-dispatch resolver (§4.5): maps a call on a polymorphic
//! operation plus an inferred receiver type to a concrete implementation
//! MFA, so its effect can be consulted.

use crate::domain::{CompactEffect, Effect, Mfa, Type};

/// The structural shape of a receiver, as far as the protocol resolver
/// needs to know it. Built-in receivers map to built-in protocol
/// implementation modules; `struct(M)` dispatches to `Protocol.M`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverShape {
    List,
    Map,
    Struct(String),
    Primitive,
    Unknown,
}

impl ReceiverShape {
    pub fn from_type(t: &Type) -> Self {
        match t {
            Type::List(_) => ReceiverShape::List,
            Type::Map(_, _) => ReceiverShape::Map,
            Type::Struct { module, .. } => ReceiverShape::Struct(module.clone()),
            t if t.is_primitive() => ReceiverShape::Primitive,
            _ => ReceiverShape::Unknown,
        }
    }

    fn protocol_module(&self) -> Option<String> {
        match self {
            ReceiverShape::List => Some("Protocol.List".to_string()),
            ReceiverShape::Map => Some("Protocol.Map".to_string()),
            ReceiverShape::Struct(module) => Some(format!("Protocol.{module}")),
            ReceiverShape::Primitive => Some("Protocol.Primitive".to_string()),
            ReceiverShape::Unknown => None,
        }
    }
}

/// Function-specific mapping table (§4.5): a dispatching call on the
/// protocol module is translated to the implementation module's own
/// function/arity, which may differ from the call site's.
fn map_operation(function: &str, arity: u32) -> Option<(&'static str, u32)> {
    match (function, arity) {
        ("map", 2) => Some(("reduce", 3)),
        ("count", 1) => Some(("count", 1)),
        ("member?", 2) => Some(("member?", 2)),
        ("into", 2) => Some(("into", 1)),
        _ => None,
    }
}

pub struct ProtocolResolver<'a> {
    /// Tests whether `(module, function, arity)` exists in the registry
    /// or among the modules under analysis — the resolver never invents
    /// an implementation that isn't actually reachable (§3 invariant 6).
    exists: &'a dyn Fn(&Mfa) -> bool,
}

impl<'a> ProtocolResolver<'a> {
    pub fn new(exists: &'a dyn Fn(&Mfa) -> bool) -> Self {
        Self { exists }
    }

    /// Resolve a dispatching call `function/arity` against `receiver`.
    /// Returns `None` (conservative `unknown`) when the receiver shape or
    /// concrete implementation cannot be determined.
    pub fn resolve(&self, function: &str, arity: u32, receiver: &ReceiverShape) -> Option<Mfa> {
        let module = receiver.protocol_module()?;
        let (impl_fn, impl_arity) = match map_operation(function, arity) {
            Some((f, a)) => (f.to_string(), a),
            None => (function.to_string(), arity),
        };
        let mfa = Mfa::new(module, impl_fn, impl_arity);
        if (self.exists)(&mfa) {
            Some(mfa)
        } else {
            None
        }
    }

    /// `combine(impl_effect, lambda_effect)` (§4.5): severity-max, except
    /// (1) if `impl_effect` is exactly the `lambda` placeholder, the
    /// result is the lambda's own effect, and (2) exception sets union
    /// rather than severity-max-and-discard.
    pub fn combine_effects(impl_effect: &Effect, lambda_effect: &Effect) -> Effect {
        if matches!(impl_effect, Effect::Label(crate::domain::Label::Lambda, _)) {
            return lambda_effect.clone();
        }

        let impl_compact = impl_effect.to_compact();
        let lambda_compact = lambda_effect.to_compact();
        if let (CompactEffect::Exception(a), CompactEffect::Exception(b)) = (&impl_compact, &lambda_compact) {
            return Effect::single(crate::domain::Label::Exn(a.union(b).cloned().collect()));
        }

        impl_effect.combine(lambda_effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Label;

    #[test]
    fn list_receiver_maps_map2_to_reduce3() {
        let exists = |mfa: &Mfa| mfa == &Mfa::new("Protocol.List", "reduce", 3);
        let resolver = ProtocolResolver::new(&exists);
        let resolved = resolver.resolve("map", 2, &ReceiverShape::List);
        assert_eq!(resolved, Some(Mfa::new("Protocol.List", "reduce", 3)));
    }

    #[test]
    fn struct_receiver_dispatches_to_its_own_protocol_module() {
        let exists = |mfa: &Mfa| mfa == &Mfa::new("Protocol.MyStruct", "count", 1);
        let resolver = ProtocolResolver::new(&exists);
        let resolved = resolver.resolve("count", 1, &ReceiverShape::Struct("MyStruct".to_string()));
        assert_eq!(resolved, Some(Mfa::new("Protocol.MyStruct", "count", 1)));
    }

    #[test]
    fn unknown_receiver_never_resolves() {
        let exists = |_: &Mfa| true;
        let resolver = ProtocolResolver::new(&exists);
        assert_eq!(resolver.resolve("map", 2, &ReceiverShape::Unknown), None);
    }

    #[test]
    fn nonexistent_implementation_resolves_to_none() {
        let exists = |_: &Mfa| false;
        let resolver = ProtocolResolver::new(&exists);
        assert_eq!(resolver.resolve("count", 1, &ReceiverShape::List), None);
    }

    #[test]
    fn lambda_placeholder_impl_effect_yields_exactly_the_lambda_effect() {
        let lambda_effect = Effect::single(Label::Io);
        let result = ProtocolResolver::combine_effects(&Effect::single(Label::Lambda), &lambda_effect);
        assert_eq!(result, lambda_effect);
    }

    #[test]
    fn exception_sets_union_on_combine() {
        use std::collections::BTreeSet;
        let a = Effect::single(Label::Exn(BTreeSet::from(["A".to_string()])));
        let b = Effect::single(Label::Exn(BTreeSet::from(["B".to_string()])));
        let combined = ProtocolResolver::combine_effects(&a, &b);
        match combined.to_compact() {
            CompactEffect::Exception(kinds) => {
                assert!(kinds.contains("A") && kinds.contains("B"));
            }
            other => panic!("expected Exception, got {other:?}"),
        }
    }
}
