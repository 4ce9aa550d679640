//! Run configuration (§10.4): the handful of knobs left as implementation
//! parameters, loaded from an optional TOML file with `serde`-derived
//! defaults — only a few dials to turn, so no preset tiers or migration
//! machinery.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisResult;

/// Knobs controlling the fixed-point driver and the registry resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum rounds of fixpoint iteration within one non-trivial SCC
    /// before unstable functions are marked `unknown` (§4.9, default 10).
    pub max_fixpoint_rounds: usize,
    /// Upper bound on `resolve_to_leaves` BFS steps, overriding the
    /// default "number of known registry entries" bound when set (§4.3).
    pub max_resolver_depth: Option<usize>,
    /// Whether to load the optional resolution file (§6) eagerly at
    /// startup, versus deriving the call graph purely from the walker's
    /// structural `calls` sets.
    pub load_resolution_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_fixpoint_rounds: 10,
            max_resolver_depth: None,
            load_resolution_file: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> AnalysisResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> AnalysisResult<Self> {
        toml::from_str(text).map_err(|e| {
            crate::error::AnalysisError::new(crate::error::ErrorKind::Config, format!("invalid config: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_bound() {
        let config = Config::default();
        assert_eq!(config.max_fixpoint_rounds, 10);
        assert!(config.load_resolution_file);
    }

    #[test]
    fn parses_partial_overrides_with_serde_defaults() {
        let config = Config::parse("max_fixpoint_rounds = 5\n").unwrap();
        assert_eq!(config.max_fixpoint_rounds, 5);
        assert!(config.load_resolution_file, "unspecified fields keep their default");
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(Config::parse("not = [valid").is_err());
    }
}
