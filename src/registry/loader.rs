//! Registry loading: three JSON layers (seed < generated < explicit),
//! merged deep at the function level (§4.3, §6). A shipped seed file
//! rather than a hardcoded Rust table, so the baseline classification
//! can be edited and re-shipped without a rebuild (§6).

use std::path::Path;

use ahash::AHashMap;
use serde_json::Value;

use crate::domain::{CompactEffect, Mfa};
use crate::error::AnalysisError;
use crate::registry::entry::{descriptor_from_json, parse_function_arity};

/// A single loaded layer: `mfa -> effect`. The `_metadata` top-level key
/// is ignored by design. `ahash` backs this map rather than the
/// standard library's default hasher since it sits on the registry's hot
/// lookup path (§4.3, consulted once per call site during inference).
pub type EffectLayer = AHashMap<Mfa, CompactEffect>;

pub fn parse_layer(text: &str) -> Result<EffectLayer, AnalysisError> {
    let root: Value = serde_json::from_str(text)?;
    parse_layer_value(&root)
}

pub fn parse_layer_value(root: &Value) -> Result<EffectLayer, AnalysisError> {
    let mut out = EffectLayer::new();
    let object = root
        .as_object()
        .ok_or_else(|| AnalysisError::new(crate::error::ErrorKind::Config, "registry layer must be a JSON object"))?;

    for (module, functions) in object {
        if module == "_metadata" {
            continue;
        }
        let functions = functions.as_object().ok_or_else(|| {
            AnalysisError::new(
                crate::error::ErrorKind::Config,
                format!("module `{module}` must map to an object of function descriptors"),
            )
        })?;
        for (key, descriptor) in functions {
            let Some((function, arity)) = parse_function_arity(key) else {
                continue;
            };
            match descriptor_from_json(descriptor) {
                Ok(effect) => {
                    out.insert(Mfa::new(module.clone(), function, arity), effect);
                }
                Err(msg) => {
                    tracing::warn!(module = %module, function = %key, error = %msg, "skipping malformed effect descriptor");
                }
            }
        }
    }

    Ok(out)
}

pub fn load_layer_file(path: &Path) -> Result<EffectLayer, AnalysisError> {
    let text = std::fs::read_to_string(path)?;
    parse_layer(&text)
}

/// Deep per-function merge: `seed < generated < explicit`. Never
/// overwrites an entire module's function map — only individual
/// functions, with the higher-priority layer winning (§4.3, §8 property
/// 6).
pub fn merge_layers(seed: &EffectLayer, generated: &EffectLayer, explicit: &EffectLayer) -> EffectLayer {
    let mut merged = seed.clone();
    for (mfa, effect) in generated {
        merged.insert(mfa.clone(), effect.clone());
    }
    for (mfa, effect) in explicit {
        merged.insert(mfa.clone(), effect.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_metadata_key() {
        let json = serde_json::json!({
            "_metadata": {"version": 1},
            "Kernel": {"+/2": "p"},
        });
        let layer = parse_layer_value(&json).unwrap();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer[&Mfa::new("Kernel", "+", 2)], CompactEffect::Pure);
    }

    #[test]
    fn explicit_wins_over_generated_wins_over_seed_per_function() {
        let seed = parse_layer_value(&serde_json::json!({"File": {"write/2": "s"}})).unwrap();
        let generated = parse_layer_value(&serde_json::json!({"File": {"write/2": "u"}})).unwrap();
        let explicit = parse_layer_value(&serde_json::json!({"File": {"write/2": "p"}})).unwrap();

        let merged = merge_layers(&seed, &generated, &explicit);
        assert_eq!(merged[&Mfa::new("File", "write", 2)], CompactEffect::Pure);
    }

    #[test]
    fn merge_is_per_function_not_per_module() {
        let seed = parse_layer_value(&serde_json::json!({"File": {"write/2": "s", "read/1": "s"}})).unwrap();
        let explicit = parse_layer_value(&serde_json::json!({"File": {"write/2": "p"}})).unwrap();
        let merged = merge_layers(&seed, &EffectLayer::new(), &explicit);

        assert_eq!(merged[&Mfa::new("File", "write", 2)], CompactEffect::Pure);
        assert_eq!(merged[&Mfa::new("File", "read", 1)], CompactEffect::SideEffecting(Default::default()));
    }
}
