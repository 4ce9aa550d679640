//! Bidirectional type-and-effect inference (§4.8): `context` is the
//! per-function scope/fresh-variable environment, `engine` is the
//! mutually recursive synthesize/check pair built on top of it.

pub mod context;
pub mod engine;

pub use context::Context;
pub use engine::{Engine, Inferred};
