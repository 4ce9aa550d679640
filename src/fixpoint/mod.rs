//! Interprocedural driving (§4.6, §4.9): iterate every SCC of the module
//! dependency graph in reverse-topological order, analyzing trivial SCCs
//! once and non-trivial ones to a bounded fixed point.

pub mod driver;
pub mod ports;

pub use driver::FixpointStrategy;
pub use ports::{AnalysisMetrics, AnalysisStrategy};
