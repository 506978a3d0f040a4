//! Resource lists embedded in a caption parameter line.
//!
//! # Sub-formats
//! 1. `Civitai resources: [{"type":"lora","weight":0.8,"modelVersionId":123}, ...]`
//!    plus the legacy `Type = lora }"` form, keyed by registry id
//! 2. `Hashes: {"model": "31e35c80fc", "lora:name": "7c6bad76eb"}`, keyed by hash
//! 3. `Lora hashes: "name: 7c6bad76eb, other: 0a1b2c3d4e"`, keyed by hash
//!
//! All three are applied when present.

use crate::models::{ResourceKind, ResourceRef};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

const CIVITAI_MARKER: &str = "Civitai resources:";
const LEGACY_LORA_MARKER: &str = "Type = lora }\"";
const HASHES_MARKER: &str = "Hashes: {";
const LORA_HASHES_MARKER: &str = "Lora hashes: \"";

/// A flat JSON object with no nested braces.
static JSON_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^{}]*\}").unwrap());

/// A `"key": "value"` pair; the value may be empty.
static QUOTED_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"\s*:\s*"([^"]*)""#).unwrap());

/// Extract every resource reference from a parameter line.
pub fn extract(params: &str) -> Vec<ResourceRef> {
    let mut refs = Vec::new();
    if let Some((_, segment)) = params.split_once(CIVITAI_MARKER) {
        refs.extend(civitai_resources(segment));
        refs.extend(legacy_loras(segment));
    }
    if let Some((_, segment)) = params.split_once(HASHES_MARKER) {
        refs.extend(hashes(segment));
    }
    if let Some((_, segment)) = params.split_once(LORA_HASHES_MARKER) {
        refs.extend(lora_hashes(segment));
    }
    refs
}

fn version_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn civitai_resources(segment: &str) -> Vec<ResourceRef> {
    JSON_FRAGMENT
        .find_iter(segment)
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .filter_map(|fragment| {
            let kind = match fragment.get("type").and_then(Value::as_str)? {
                "lora" => ResourceKind::Lora,
                "checkpoint" => ResourceKind::Model,
                "embed" => ResourceKind::Embed,
                _ => return None,
            };
            let id = fragment.get("modelVersionId").and_then(version_id)?;
            let weight = match kind {
                ResourceKind::Lora => fragment
                    .get("weight")
                    .and_then(Value::as_f64)
                    .unwrap_or(1.0),
                _ => 1.0,
            };
            Some(ResourceRef::with_id(kind, id).weight(weight))
        })
        .collect()
}

/// Legacy LoRA entries: `Type = lora }": {"weight":0.8,"modelVersionId":123}`.
///
/// The id is everything after `"modelVersionId":` up to the closing brace
/// and must be an integer.
fn legacy_loras(segment: &str) -> Vec<ResourceRef> {
    let mut refs = Vec::new();
    for (start, marker) in segment.match_indices(LEGACY_LORA_MARKER) {
        let rest = &segment[start + marker.len()..];
        let Some((work, _)) = rest.split_once('}') else {
            continue;
        };
        let Some((_, id)) = work.split_once("\"modelVersionId\":") else {
            continue;
        };
        let id = id.trim();
        if id.parse::<u64>().is_err() {
            warn!("Unable to determine lora id from legacy resource entry: {:?}", id);
            continue;
        }
        let weight = work
            .split_once("\"weight\":")
            .and_then(|(_, w)| w.split(',').next())
            .and_then(|w| w.trim().parse::<f64>().ok())
            .unwrap_or(1.0);
        refs.push(ResourceRef::with_id(ResourceKind::Lora, id).weight(weight));
    }
    refs
}

/// `"kind[:name]": "hash"` pairs up to the first closing brace.
fn hashes(segment: &str) -> Vec<ResourceRef> {
    let body = segment.split('}').next().unwrap_or_default();
    QUOTED_PAIR
        .captures_iter(body)
        .filter_map(|caps| {
            let hash = caps[2].trim();
            if hash.is_empty() {
                return None;
            }
            let key = caps[1].to_lowercase();
            let kind = key.split(':').next().unwrap_or_default();
            Some(ResourceRef::with_hash(ResourceKind::parse(kind), hash))
        })
        .collect()
}

/// `name: hash` pairs up to the closing quote.
fn lora_hashes(segment: &str) -> Vec<ResourceRef> {
    let body = segment.split('"').next().unwrap_or_default();
    body.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(_, hash)| hash.trim())
        .filter(|hash| !hash.is_empty())
        .map(|hash| ResourceRef::with_hash(ResourceKind::Lora, hash))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_civitai_resources() {
        let params = r#"Steps: 30, Civitai resources: [{"type":"checkpoint","modelVersionId":290640},{"type":"lora","weight":0.65,"modelVersionId":"135867"},{"type":"embed","modelVersionId":9208},{"type":"upscaler","modelVersionId":1}], Civitai metadata: {}"#;
        let refs = extract(params);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].kind, ResourceKind::Model);
        assert_eq!(refs[0].registry_id, "290640");
        assert_eq!(refs[1].kind, ResourceKind::Lora);
        assert_eq!(refs[1].registry_id, "135867");
        assert_eq!(refs[1].weight, 0.65);
        assert_eq!(refs[2].kind, ResourceKind::Embed);
    }

    #[test]
    fn test_legacy_lora_entries() {
        let params = r#"Civitai resources: {"{ Type = lora }": {"weight":0.8,"modelVersionId":4321}, "{ Type = lora }": {"modelVersionId":abc}}"#;
        let refs = legacy_loras(params);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].registry_id, "4321");
        assert_eq!(refs[0].weight, 0.8);
    }

    #[test]
    fn test_hashes_segment() {
        let params = r#"Seed: 1, Hashes: {"vae": "735e4c3a44", "lora:add_detail": "7c6bad76eb", "model": ""}, Version: v1"#;
        let refs = extract(params);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, ResourceKind::Vae);
        assert_eq!(refs[1].kind, ResourceKind::Lora);
        assert_eq!(refs[1].content_hash, "7c6bad76eb");
    }

    #[test]
    fn test_lora_hashes_segment() {
        let params = r#"Lora hashes: "add_detail: 7c6bad76eb54, more_art: 1ba0f1d3a2", Version: v1"#;
        let refs = extract(params);
        let hashes: Vec<_> = refs.iter().map(|r| r.content_hash.as_str()).collect();
        assert_eq!(hashes, vec!["7c6bad76eb54", "1ba0f1d3a2"]);
        assert!(refs.iter().all(|r| r.kind == ResourceKind::Lora));
    }

    #[test]
    fn test_all_formats_applied() {
        let params = r#"Hashes: {"model": "aaaa"}, Lora hashes: "x: bbbb", Civitai resources: [{"type":"lora","modelVersionId":5}]"#;
        assert_eq!(extract(params).len(), 3);
    }
}
