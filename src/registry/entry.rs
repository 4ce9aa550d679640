//! The seed/generated/explicit registry JSON descriptor shape (§6) and its
//! mapping to/from `CompactEffect` (§3).

use std::collections::BTreeSet;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::domain::{CompactEffect, Mfa};

/// One function's effect descriptor as it appears in a registry JSON
/// file: either a bare one-character string token, or an object with
/// exactly one of the keys `"e"`, `"s"`, `"d"` mapping to an array of
/// strings.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDescriptor(pub CompactEffect);

impl Serialize for EffectDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        match &self.0 {
            CompactEffect::Pure => serializer.serialize_str("p"),
            CompactEffect::LambdaDependent => serializer.serialize_str("l"),
            CompactEffect::Nif => serializer.serialize_str("n"),
            CompactEffect::Unknown => serializer.serialize_str("u"),
            CompactEffect::SideEffecting(sites) if sites.is_empty() => serializer.serialize_str("s"),
            CompactEffect::Dependent(sites) if sites.is_empty() => serializer.serialize_str("d"),
            CompactEffect::SideEffecting(sites) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("s", &sites.iter().map(Mfa::to_string).collect::<Vec<_>>())?;
                map.end()
            }
            CompactEffect::Dependent(sites) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("d", &sites.iter().map(Mfa::to_string).collect::<Vec<_>>())?;
                map.end()
            }
            CompactEffect::Exception(kinds) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("e", &kinds.iter().cloned().collect::<Vec<_>>())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for EffectDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        descriptor_from_json(&value).map(EffectDescriptor).map_err(DeError::custom)
    }
}

pub fn descriptor_from_json(value: &Value) -> Result<CompactEffect, String> {
    match value {
        Value::String(s) if s.chars().count() == 1 => {
            let c = s.chars().next().unwrap();
            CompactEffect::from_letter_and_payload(c, BTreeSet::new(), BTreeSet::new())
                .ok_or_else(|| format!("unknown effect token `{s}`"))
        }
        Value::Object(map) => {
            let mut iter = map.iter();
            let (key, items) = iter.next().ok_or_else(|| "empty effect descriptor object".to_string())?;
            if iter.next().is_some() {
                return Err("effect descriptor object must have exactly one key".to_string());
            }
            let items = items.as_array().ok_or_else(|| "effect descriptor payload must be an array".to_string())?;
            let strings: Vec<String> = items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            match key.as_str() {
                "e" => Ok(CompactEffect::Exception(strings.into_iter().collect())),
                "s" => Ok(CompactEffect::SideEffecting(parse_mfa_set(&strings))),
                "d" => Ok(CompactEffect::Dependent(parse_mfa_set(&strings))),
                other => Err(format!("unknown effect descriptor key `{other}`")),
            }
        }
        other => Err(format!("invalid effect descriptor: {other}")),
    }
}

fn parse_mfa_set(strings: &[String]) -> BTreeSet<Mfa> {
    strings.iter().filter_map(|s| parse_mfa(s)).collect()
}

/// Parse `"Module.function/arity"` into an `Mfa`.
pub fn parse_mfa(s: &str) -> Option<Mfa> {
    let (head, arity) = s.rsplit_once('/')?;
    let arity: u32 = arity.parse().ok()?;
    let (module, function) = head.rsplit_once('.')?;
    Some(Mfa::new(module, function, arity))
}

/// Parse `"function/arity"` (no module — used as a JSON object key
/// within a module's function map).
pub fn parse_function_arity(s: &str) -> Option<(String, u32)> {
    let (function, arity) = s.rsplit_once('/')?;
    let arity: u32 = arity.parse().ok()?;
    Some((function.to_string(), arity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bare_letter_tokens() {
        for letter in ['p', 'l', 'n', 'u'] {
            let parsed = descriptor_from_json(&Value::String(letter.to_string())).unwrap();
            let back = EffectDescriptor(parsed.clone());
            let json = serde_json::to_value(&back).unwrap();
            assert_eq!(json, Value::String(letter.to_string()));
        }
    }

    #[test]
    fn parses_exception_payload() {
        let value = serde_json::json!({"e": ["ArgumentError", "RuntimeError"]});
        let parsed = descriptor_from_json(&value).unwrap();
        match parsed {
            CompactEffect::Exception(kinds) => {
                assert!(kinds.contains("ArgumentError"));
                assert!(kinds.contains("RuntimeError"));
            }
            other => panic!("expected Exception, got {other:?}"),
        }
    }

    #[test]
    fn parses_side_effecting_payload_sites() {
        let value = serde_json::json!({"s": ["File.write/2"]});
        let parsed = descriptor_from_json(&value).unwrap();
        match parsed {
            CompactEffect::SideEffecting(sites) => {
                assert!(sites.contains(&Mfa::new("File", "write", 2)));
            }
            other => panic!("expected SideEffecting, got {other:?}"),
        }
    }

    #[test]
    fn rejects_multi_key_objects() {
        let value = serde_json::json!({"e": [], "s": []});
        assert!(descriptor_from_json(&value).is_err());
    }

    #[test]
    fn parses_function_arity_key() {
        assert_eq!(parse_function_arity("write/2"), Some(("write".to_string(), 2)));
        assert_eq!(parse_function_arity("malformed"), None);
    }
}
