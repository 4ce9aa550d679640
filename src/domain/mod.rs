//! Types & Effects algebra, substitution, and unification (§3, §4.1, §4.2).
//!
//! This is the closed structural core the rest of the pipeline is built
//! on: `types::Type` and `effects::Effect` are the two sum types the
//! inference engine produces, `substitution` composes bindings between
//! them, and `unify` implements first-order unification over both.

pub mod effects;
pub mod substitution;
pub mod types;
pub mod unify;

pub use effects::{CompactEffect, Effect, Label, Mfa};
pub use substitution::Substitution;
pub use types::{FreeVars, Type, VarId};
