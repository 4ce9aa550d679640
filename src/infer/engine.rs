//! The bidirectional type-and-effect inference engine (§4.8) — the heart
//! of the analyzer. Two mutually recursive modes: `synthesize` infers a
//! `(type, effect)` pair from an expression; `check` verifies one against
//! an expectation.
//!
//! Per the failure-semantics policy (§4.10, §7), neither mode ever
//! aborts: a shape it cannot handle, or a unification that fails, is
//! recorded into the caller-supplied `errors` list and replaced with a
//! conservative `(fresh type-var, unknown effect)` fallback.

use crate::ast::{Clause, Expr, Literal, Pattern};
use crate::domain::unify::{unify, unify_effect};
use crate::domain::{Effect, Label, Mfa, Substitution, Type};
use crate::error::AnalysisError;
use crate::infer::context::Context;
use crate::registry::{ProtocolResolver, ReceiverShape, Registry};

/// Modules known to dispatch over a polymorphic receiver (§4.5); calls
/// into these are resolved through the protocol resolver rather than
/// looked up directly.
fn is_dispatching_module(module: &str) -> bool {
    matches!(module, "Enum" | "String.Chars")
}

pub struct Engine<'r> {
    registry: &'r Registry,
    current_module: String,
}

/// Outcome of inferring one expression: its type, effect, and the
/// substitution accumulated along the way.
pub type Inferred = (Type, Effect, Substitution);

impl<'r> Engine<'r> {
    pub fn new(registry: &'r Registry, current_module: impl Into<String>) -> Self {
        Self { registry, current_module: current_module.into() }
    }

    fn fallback(ctx: &mut Context) -> Inferred {
        (ctx.fresh_type(), Effect::unknown(), Substitution::empty())
    }

    pub fn synthesize(&self, expr: &Expr, ctx: &mut Context, errors: &mut Vec<AnalysisError>) -> Inferred {
        match expr {
            Expr::Literal(lit, _) => {
                let t = match lit {
                    Literal::Int(_) => Type::Int,
                    Literal::Float(_) => Type::Float,
                    Literal::Bool(_) => Type::Bool,
                    Literal::String(_) => Type::String,
                    Literal::Atom(_) => Type::Atom,
                };
                (t, Effect::empty(), Substitution::empty())
            }

            Expr::ModuleAlias(_, _) => (Type::Atom, Effect::empty(), Substitution::empty()),

            Expr::Var(name, _) => match ctx.lookup(name).cloned() {
                Some(scheme) => (ctx.instantiate(&scheme), Effect::empty(), Substitution::empty()),
                None => (ctx.fresh_type(), Effect::empty(), Substitution::empty()),
            },

            Expr::QualifiedCall { module, function, args, span } => {
                let (arg_types, arg_effect, subst) = self.synthesize_args(args, ctx, errors);
                let mfa = Mfa::new(module.clone(), function.clone(), args.len() as u32);
                let call_effect = self.resolve_call_effect(&mfa, &arg_types, &arg_effect);
                let _ = span;
                let result = ctx.fresh_type();
                (result, arg_effect.combine(&call_effect), subst)
            }

            Expr::LocalCall { function, args, span } => {
                let (arg_types, arg_effect, subst) = self.synthesize_args(args, ctx, errors);
                let kernel_mfa = Mfa::new("Kernel", function.clone(), args.len() as u32);
                let local_mfa = Mfa::new(self.current_module.clone(), function.clone(), args.len() as u32);
                let call_effect = if self.registry.effect_type(&kernel_mfa).is_some() {
                    self.resolve_call_effect(&kernel_mfa, &arg_types, &arg_effect)
                } else if self.registry.effect_type(&local_mfa).is_some() {
                    self.resolve_call_effect(&local_mfa, &arg_types, &arg_effect)
                } else {
                    let _ = span;
                    Effect::unknown()
                };
                (ctx.fresh_type(), arg_effect.combine(&call_effect), subst)
            }

            Expr::Apply { callee, args, .. } => {
                let (callee_type, callee_effect, mut subst) = self.synthesize(callee, ctx, errors);
                let callee_type = subst.apply_type(&callee_type);
                let (arg_types, arg_effect, arg_subst) = self.synthesize_args(args, ctx, errors);
                let _ = arg_types;
                subst = Substitution::compose(&arg_subst, &subst);

                let (result_type, call_effect) = match callee_type.latent_effect() {
                    Some(eps) => {
                        let result = match &callee_type {
                            Type::Function { result, .. } | Type::Closure { result, .. } => (**result).clone(),
                            _ => ctx.fresh_type(),
                        };
                        (result, eps.clone())
                    }
                    None => (ctx.fresh_type(), ctx.fresh_effect()),
                };

                let combined = callee_effect.combine(&arg_effect).combine(&call_effect);
                (result_type, combined, subst)
            }

            Expr::Lambda { params, body, .. } => {
                ctx.push_scope();
                for p in params {
                    for name in p.bound_vars() {
                        let fresh = ctx.fresh_type();
                        ctx.bind(name.to_string(), fresh);
                    }
                }
                let (body_type, body_effect, body_subst) = self.synthesize(body, ctx, errors);
                ctx.pop_scope();
                let param_type = if params.len() == 1 {
                    pattern_placeholder_type(&params[0])
                } else {
                    Type::Tuple(params.iter().map(pattern_placeholder_type).collect())
                };
                (Type::function(param_type, body_effect, body_type), Effect::empty(), body_subst)
            }

            Expr::Capture { module, function, arity, .. } => {
                let mfa = Mfa::new(module.clone(), function.clone(), *arity);
                let effect = self
                    .registry
                    .effect_type(&mfa)
                    .map(|c| c.to_effect())
                    .unwrap_or_else(Effect::unknown);
                let t = Type::function(ctx.fresh_type(), effect, ctx.fresh_type());
                (t, Effect::empty(), Substitution::empty())
            }

            Expr::Let { pattern, value, rest, .. } => {
                let (value_type, value_effect, mut subst) = self.synthesize(value, ctx, errors);
                let is_pure = value_effect.is_empty();

                ctx.push_scope();
                match pattern {
                    Pattern::Var(name) if is_pure => {
                        let scheme = ctx.generalize(&value_type);
                        ctx.bind(name.clone(), scheme);
                    }
                    Pattern::Var(name) => ctx.bind(name.clone(), value_type.clone()),
                    other => {
                        for name in other.bound_vars() {
                            ctx.bind(name.to_string(), ctx_fresh(ctx));
                        }
                    }
                }

                let (rest_type, rest_effect, rest_subst) = self.synthesize(rest, ctx, errors);
                ctx.pop_scope();
                subst = Substitution::compose(&rest_subst, &subst);
                (rest_type, value_effect.combine(&rest_effect), subst)
            }

            Expr::If { cond, then_branch, else_branch, span } => {
                let (_, cond_effect, mut subst) = self.check(cond, &Type::Bool, &Effect::empty(), ctx, errors);
                let (then_type, then_effect, then_subst) = self.synthesize(then_branch, ctx, errors);
                let (else_type, else_effect, else_subst) = self.synthesize(else_branch, ctx, errors);
                subst = Substitution::compose(&then_subst, &subst);
                subst = Substitution::compose(&else_subst, &subst);
                let then_type = subst.apply_type(&then_type);
                let else_type = subst.apply_type(&else_type);
                let branch_type = match unify(&then_type, &else_type, span) {
                    Ok(s) => {
                        subst = Substitution::compose(&s, &subst);
                        subst.apply_type(&then_type)
                    }
                    Err(e) => {
                        errors.push(e);
                        then_type
                    }
                };
                (branch_type, cond_effect.combine(&then_effect).combine(&else_effect), subst)
            }

            Expr::Match { scrutinee, clauses, span } => self.synthesize_match(scrutinee, clauses, span, ctx, errors),

            Expr::Tuple(items, _) => {
                let (types, effect, subst) = self.synthesize_args(items, ctx, errors);
                (Type::Tuple(types), effect, subst)
            }

            Expr::List(items, _) => {
                let (types, effect, subst) = self.synthesize_args(items, ctx, errors);
                let elem = types.into_iter().next().unwrap_or_else(|| ctx.fresh_type());
                (Type::List(Box::new(elem)), effect, subst)
            }

            Expr::Map(pairs, _) => {
                let mut effect = Effect::empty();
                let mut subst = Substitution::empty();
                let mut key_ty = ctx.fresh_type();
                let mut val_ty = ctx.fresh_type();
                for (k, v) in pairs {
                    let (kt, ke, ks) = self.synthesize(k, ctx, errors);
                    let (vt, ve, vs) = self.synthesize(v, ctx, errors);
                    subst = Substitution::compose(&vs, &Substitution::compose(&ks, &subst));
                    effect = effect.combine(&ke).combine(&ve);
                    key_ty = kt;
                    val_ty = vt;
                }
                (Type::Map(Box::new(key_ty), Box::new(val_ty)), effect, subst)
            }

            Expr::Binary(segments, _) => {
                let mut effect = Effect::empty();
                let mut subst = Substitution::empty();
                for seg in segments {
                    let (_, e, s) = self.synthesize(&seg.expr, ctx, errors);
                    effect = effect.combine(&e);
                    subst = Substitution::compose(&s, &subst);
                }
                (Type::String, effect, subst)
            }

            Expr::Block(stmts, _) => {
                let mut effect = Effect::empty();
                let mut subst = Substitution::empty();
                let mut last_type = Type::Atom;
                for stmt in stmts {
                    let (t, e, s) = self.synthesize(stmt, ctx, errors);
                    last_type = t;
                    effect = effect.combine(&e);
                    subst = Substitution::compose(&s, &subst);
                }
                (last_type, effect, subst)
            }
        }
    }

    /// **Checking mode** (§4.8): delegate to synthesis, then unify
    /// against the expected type and reconcile the synthesized effect
    /// against the expected one via row-unification.
    pub fn check(
        &self,
        expr: &Expr,
        expected_type: &Type,
        expected_effect: &Effect,
        ctx: &mut Context,
        errors: &mut Vec<AnalysisError>,
    ) -> Inferred {
        let (t, e, mut subst) = self.synthesize(expr, ctx, errors);
        match unify(&subst.apply_type(&t), expected_type, expr.span()) {
            Ok(s) => subst = Substitution::compose(&s, &subst),
            Err(err) => {
                errors.push(err);
                return Self::fallback(ctx);
            }
        }
        match unify_effect(&subst.apply_effect(&e), expected_effect, expr.span()) {
            Ok(s) => subst = Substitution::compose(&s, &subst),
            Err(err) => {
                errors.push(err);
                return (subst.apply_type(&t), Effect::unknown(), subst);
            }
        }
        (subst.apply_type(&t), subst.apply_effect(&e), subst)
    }

    fn synthesize_args(&self, args: &[Expr], ctx: &mut Context, errors: &mut Vec<AnalysisError>) -> (Vec<Type>, Effect, Substitution) {
        let mut types = Vec::with_capacity(args.len());
        let mut effect = Effect::empty();
        let mut subst = Substitution::empty();
        for arg in args {
            let (t, e, s) = self.synthesize(arg, ctx, errors);
            types.push(t);
            effect = effect.combine(&e);
            subst = Substitution::compose(&s, &subst);
        }
        (types, effect, subst)
    }

    /// Resolve the effect of a call site against the registry, applying
    /// the lambda-dependent lift rule (§4.8's closing paragraph) when the
    /// registry marks the callee `lambda` (or it is entirely unresolved)
    /// and one of the arguments carries a concrete latent effect.
    fn resolve_call_effect(&self, mfa: &Mfa, arg_types: &[Type], _arg_effect: &Effect) -> Effect {
        let registry_effect = self.registry.effect_type(mfa).map(|c| c.to_effect());

        let lambda_arg_effect = arg_types.iter().find_map(|t| t.latent_effect());

        match registry_effect {
            Some(Effect::Label(Label::Lambda, _)) => self.lift_lambda(mfa, arg_types, lambda_arg_effect),
            Some(effect) => effect,
            None => match lambda_arg_effect {
                Some(effect) if effect.is_concrete() => effect.clone(),
                _ => Effect::unknown(),
            },
        }
    }

    /// The lambda-dependent lift rule (§4.8): combine the lambda
    /// argument's own latent effect with the collection implementation's
    /// effect, obtained via protocol resolution when the receiver's
    /// concrete type is known (§4.5's `combine(impl_effect, lambda_effect)`).
    fn lift_lambda(&self, mfa: &Mfa, arg_types: &[Type], lambda_arg_effect: Option<&Effect>) -> Effect {
        let lambda_effect = match lambda_arg_effect {
            Some(e) => e.clone(),
            None => return Effect::unknown(),
        };

        if is_dispatching_module(&mfa.module) {
            let receiver_index = receiver_arg_index(&mfa.function);
            let receiver_shape =
                arg_types.get(receiver_index).map(ReceiverShape::from_type).unwrap_or(ReceiverShape::Unknown);
            let exists = |candidate: &Mfa| self.registry.contains(candidate);
            let resolver = ProtocolResolver::new(&exists);
            if let Some(impl_mfa) = resolver.resolve(&mfa.function, mfa.arity, &receiver_shape) {
                let impl_effect = self.registry.effect_type(&impl_mfa).map(|c| c.to_effect()).unwrap_or_else(Effect::unknown);
                return ProtocolResolver::combine_effects(&impl_effect, &lambda_effect);
            }
        }

        lambda_effect
    }
}

/// The argument position holding the receiver whose structural type
/// drives protocol dispatch (§4.5): `into/2` dispatches on its *target*
/// (the second argument), every other dispatching operation on its first.
fn receiver_arg_index(function: &str) -> usize {
    match function {
        "into" => 1,
        _ => 0,
    }
}

fn ctx_fresh(ctx: &mut Context) -> Type {
    // Helper to avoid borrow-checker friction when binding inside a loop
    // that also mutably borrows `ctx` for `fresh_type`.
    ctx.fresh_type()
}

fn pattern_placeholder_type(pattern: &Pattern) -> Type {
    match pattern {
        Pattern::Literal(Literal::Int(_)) => Type::Int,
        Pattern::Literal(Literal::Float(_)) => Type::Float,
        Pattern::Literal(Literal::Bool(_)) => Type::Bool,
        Pattern::Literal(Literal::String(_)) => Type::String,
        Pattern::Literal(Literal::Atom(_)) => Type::Atom,
        _ => Type::Any,
    }
}

impl Effect {
    /// An effect is "concrete" (suitable for the lambda-lift rule's
    /// unmitigated fallback) when it carries no unresolved variable and
    /// is not itself `unknown`.
    fn is_concrete(&self) -> bool {
        !self.is_unknown() && self.free_variables().is_empty()
    }
}

impl<'r> Engine<'r> {
    fn synthesize_match(
        &self,
        scrutinee: &Expr,
        clauses: &[Clause],
        span: &crate::error::Span,
        ctx: &mut Context,
        errors: &mut Vec<AnalysisError>,
    ) -> Inferred {
        let (scrutinee_type, scrutinee_effect, mut subst) = self.synthesize(scrutinee, ctx, errors);
        let mut combined_effect = scrutinee_effect;
        let mut result_type: Option<Type> = None;

        for clause in clauses {
            ctx.push_scope();
            for name in clause.pattern.bound_vars() {
                ctx.bind(name.to_string(), ctx_fresh(ctx));
            }
            let (clause_type, clause_effect, clause_subst) = self.synthesize(&clause.body, ctx, errors);
            ctx.pop_scope();
            subst = Substitution::compose(&clause_subst, &subst);
            combined_effect = combined_effect.combine(&clause_effect);

            result_type = Some(match result_type {
                None => clause_type,
                Some(prev) => match unify(&subst.apply_type(&prev), &subst.apply_type(&clause_type), span) {
                    Ok(s) => {
                        subst = Substitution::compose(&s, &subst);
                        subst.apply_type(&prev)
                    }
                    Err(e) => {
                        errors.push(e);
                        prev
                    }
                },
            });
        }

        let _ = &scrutinee_type;
        let result_type = result_type.unwrap_or_else(|| ctx.fresh_type());
        (result_type, combined_effect, subst)
    }
}
