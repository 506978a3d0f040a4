//! JSON dialects: Fooocus, RuinedFooocus and node-graph workflows.

use super::{parse_float, parse_u32, parse_uint};
use crate::models::{Dialect, MetadataRecord, ResourceKind, ResourceRef};
use crate::text::extract_model_filename;
use serde_json::{Map, Value};
use tracing::warn;

/// Field reader over one JSON object that counts extraction failures.
///
/// A key that is absent or holds a value of the wrong shape counts as a
/// failure; the caller decides whether failures are worth reporting.
struct Fields<'a> {
    doc: &'a Map<String, Value>,
    failures: Vec<&'static str>,
}

impl<'a> Fields<'a> {
    fn new(doc: &'a Map<String, Value>) -> Self {
        Self {
            doc,
            failures: Vec::new(),
        }
    }

    fn read<T>(&mut self, key: &'static str, convert: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        let value = self.doc.get(key).and_then(convert);
        if value.is_none() {
            self.failures.push(key);
        }
        value
    }

    fn string(&mut self, key: &'static str) -> Option<String> {
        self.read(key, |v| v.as_str().map(str::to_string))
    }

    fn uint(&mut self, key: &'static str) -> Option<u64> {
        self.read(key, value_u64)
    }

    fn u32(&mut self, key: &'static str) -> Option<u32> {
        self.read(key, value_u32)
    }

    fn float(&mut self, key: &'static str) -> Option<f64> {
        self.read(key, value_f64)
    }

    fn report(&self, dialect: Dialect) {
        if !self.failures.is_empty() {
            warn!(
                "Error reading {} metadata: missing or unreadable {}",
                dialect,
                self.failures.join(", ")
            );
        }
    }
}

fn value_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(|f| parse_uint(&f.to_string()))),
        Value::String(s) => parse_uint(s),
        _ => None,
    }
}

fn value_u32(value: &Value) -> Option<u32> {
    value_u64(value).and_then(|v| u32::try_from(v).ok())
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

fn is_scalar(value: &Value) -> bool {
    value.is_string() || value.is_number()
}

/// Read a numeric node input. Inputs wired to another node are skipped;
/// unreadable scalars are counted.
fn linked_u64(value: &Value, unreadable: &mut usize) -> Option<u64> {
    let parsed = value_u64(value);
    if parsed.is_none() && is_scalar(value) {
        *unreadable += 1;
    }
    parsed
}

/// Parse a Fooocus resolution string like `(1152, 896)`.
fn parse_paren_resolution(text: &str) -> Option<(u32, u32)> {
    let inner = text.trim().trim_start_matches('(').trim_end_matches(')');
    let (w, h) = inner.split_once(',')?;
    Some((parse_u32(w)?, parse_u32(h)?))
}

/// Parse a node-graph resolution string like `1024x1024 (1.0)`.
fn parse_x_resolution(text: &str) -> Option<(Option<u32>, Option<u32>)> {
    let lower = text.trim().to_lowercase();
    let (w, h) = lower.split_once('x')?;
    let h = h.split(' ').next().unwrap_or_default();
    Some((parse_u32(w), parse_u32(h)))
}

pub(super) fn decode_fooocus(doc: &Map<String, Value>, raw: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(Dialect::Fooocus, raw);
    let mut fields = Fields::new(doc);

    let prompt = fields.string("prompt").unwrap_or_default();
    let negative = fields.string("negative_prompt").unwrap_or_default();
    record.set_prompts(&prompt, &negative);

    record.steps = fields.u32("steps");
    record.scale = fields.float("guidance_scale");
    if let Some((w, h)) = fields.read("resolution", |v| v.as_str().and_then(parse_paren_resolution)) {
        record.width = Some(w);
        record.height = Some(h);
    }
    record.sampler = fields.string("sampler").unwrap_or_default();
    record.scheduler = fields.string("scheduler").unwrap_or_default();
    record.seed = fields.uint("seed");
    record.model = fields
        .string("base_model")
        .map(|m| extract_model_filename(&m))
        .unwrap_or_default();
    record.model_hash = fields.string("base_model_hash").unwrap_or_default();
    fields.report(Dialect::Fooocus);

    // Each entry is a [name, weight, hash] tuple
    if let Some(Value::Array(loras)) = doc.get("loras") {
        for entry in loras.iter().filter_map(Value::as_array) {
            let hash = entry.get(2).and_then(Value::as_str).unwrap_or_default().trim();
            if hash.is_empty() {
                continue;
            }
            let weight = entry.get(1).and_then(value_f64).unwrap_or(1.0);
            record
                .resources
                .push(ResourceRef::with_hash(ResourceKind::Lora, hash).weight(weight));
        }
    }

    record
}

/// RuinedFooocus carries no resource hashes or ids, so no refs are produced.
pub(super) fn decode_ruined_fooocus(doc: &Map<String, Value>, raw: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(Dialect::RuinedFooocus, raw);
    let mut fields = Fields::new(doc);

    let prompt = fields.string("Prompt").unwrap_or_default();
    let negative = fields.string("Negative").unwrap_or_default();
    record.set_prompts(&prompt, &negative);

    record.steps = fields.u32("steps");
    record.scale = fields.float("cfg");
    record.width = fields.u32("width");
    record.height = fields.u32("height");
    record.sampler = fields.string("sampler_name").unwrap_or_default();
    record.scheduler = fields.string("scheduler").unwrap_or_default();
    record.seed = fields.uint("seed");
    record.model = fields
        .string("base_model_name")
        .map(|m| extract_model_filename(&m))
        .unwrap_or_default();
    record.model_hash = fields.string("base_model_hash").unwrap_or_default();
    fields.report(Dialect::RuinedFooocus);

    record
}

/// Scan a node graph for recognized inputs.
///
/// Nodes are visited in document order and the last node supplying a field
/// wins. Inputs wired to other nodes (arrays) are skipped silently; a
/// recognized scalar that cannot be read is counted and reported once.
pub(super) fn decode_node_graph(doc: &Map<String, Value>, raw: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(Dialect::NodeGraph, raw);
    let mut prompt = String::new();
    let mut negative = String::new();
    let mut unreadable = 0usize;

    let nodes: Vec<&Map<String, Value>> = doc
        .values()
        .filter_map(|node| node.get("inputs"))
        .filter_map(Value::as_object)
        .collect();

    for inputs in &nodes {
        if let Some(text) = inputs.get("text_positive").and_then(Value::as_str) {
            prompt = text.trim().to_string();
        }
        if let Some(text) = inputs.get("text_negative").and_then(Value::as_str) {
            negative = text.trim().to_string();
        }
        if let Some(seed) = inputs.get("noise_seed").and_then(|v| linked_u64(v, &mut unreadable)) {
            record.seed = Some(seed);
        }
        if let Some(sampler) = inputs.get("sampler_name").and_then(Value::as_str) {
            record.sampler = sampler.to_string();
        }
        if let Some(scheduler) = inputs.get("scheduler") {
            if let Some(name) = scheduler.as_str() {
                record.scheduler = name.to_string();
            }
            if let Some(steps) = inputs.get("steps").and_then(|v| linked_u64(v, &mut unreadable)) {
                record.steps = u32::try_from(steps).ok();
            }
        }
        if let Some(guidance) = inputs.get("guidance") {
            match value_f64(guidance) {
                Some(g) => record.scale = Some(g),
                None if is_scalar(guidance) => unreadable += 1,
                None => {}
            }
        }
        if let Some(unet) = inputs.get("unet_name").and_then(Value::as_str) {
            record.model = extract_model_filename(unet);
        }
        if let Some(width) = inputs.get("width").and_then(|v| linked_u64(v, &mut unreadable)) {
            record.width = u32::try_from(width).ok();
        }
        if let Some(height) = inputs.get("height").and_then(|v| linked_u64(v, &mut unreadable)) {
            record.height = u32::try_from(height).ok();
        }
        if let Some(resolution) = inputs.get("resolution").and_then(Value::as_str) {
            if let Some((w, h)) = parse_x_resolution(resolution) {
                record.width = w;
                record.height = h;
            }
        }
    }

    if prompt.is_empty() {
        for inputs in &nodes {
            if let Some(text) = inputs.get("text").and_then(Value::as_str) {
                prompt = text.trim().to_string();
            }
        }
    }

    record.set_prompts(&prompt, &negative);

    if unreadable > 0 {
        warn!("Error reading node-graph metadata: {} unreadable input(s)", unreadable);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(json: &str) -> Map<String, Value> {
        match serde_json::from_str::<Value>(json).unwrap() {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_fooocus_fields_and_loras() {
        let blob = r#"{
            "prompt": "a castle, ,on a hill",
            "negative_prompt": "blurry",
            "steps": 30,
            "guidance_scale": 4.5,
            "resolution": "(1152, 896)",
            "sampler": "dpmpp_2m_sde_gpu",
            "scheduler": "karras",
            "seed": "1234567890",
            "base_model": "juggernautXL_v8.safetensors",
            "base_model_hash": "aeb7e9e689",
            "loras": [["detail.safetensors", 0.5, "abcdef0123"], ["none", 1.0, ""]],
            "version": "Fooocus v2.1.865"
        }"#;
        let record = decode_fooocus(&object(blob), blob);

        assert_eq!(record.prompt, "a castle, on a hill");
        assert_eq!(record.negative_prompt, "blurry");
        assert_eq!(record.steps, Some(30));
        assert_eq!(record.scale, Some(4.5));
        assert_eq!((record.width, record.height), (Some(1152), Some(896)));
        assert_eq!(record.seed, Some(1234567890));
        assert_eq!(record.model, "juggernautXL_v8");
        assert_eq!(record.model_hash, "aeb7e9e689");
        assert_eq!(record.resources.len(), 1);
        assert_eq!(record.resources[0].content_hash, "abcdef0123");
        assert_eq!(record.resources[0].weight, 0.5);
    }

    #[test]
    fn test_fooocus_missing_fields_tolerated() {
        let blob = r#"{"prompt": "only a prompt", "version": "Fooocus v2"}"#;
        let record = decode_fooocus(&object(blob), blob);
        assert_eq!(record.prompt, "only a prompt");
        assert_eq!(record.steps, None);
        assert!(record.resources.is_empty());
    }

    #[test]
    fn test_ruined_fooocus() {
        let blob = r#"{
            "Prompt": "a fox", "Negative": "text", "steps": 20, "cfg": 7,
            "width": 1024, "height": 768, "sampler_name": "euler_ancestral",
            "scheduler": "normal", "seed": 42,
            "base_model_name": "sd_xl_base_1.0.safetensors", "base_model_hash": "31e35c80fc",
            "software": "RuinedFooocus"
        }"#;
        let record = decode_ruined_fooocus(&object(blob), blob);
        assert_eq!(record.prompt, "a fox");
        assert_eq!(record.negative_prompt, "text");
        assert_eq!(record.scale, Some(7.0));
        assert_eq!((record.width, record.height), (Some(1024), Some(768)));
        assert_eq!(record.sampler, "euler_ancestral");
        assert_eq!(record.model, "sd_xl_base_1.0");
        assert!(record.resources.is_empty());
    }

    #[test]
    fn test_node_graph_last_writer_wins() {
        let blob = r#"{
            "6": {"inputs": {"text_positive": "first prompt", "text_negative": "bad"}},
            "9": {"inputs": {"text_positive": "second prompt"}},
            "3": {"inputs": {"noise_seed": "77", "sampler_name": "euler", "scheduler": "simple", "steps": 25}},
            "4": {"inputs": {"guidance": 3.5, "unet_name": "flux/flux1-dev.safetensors"}},
            "5": {"inputs": {"resolution": "896x1152 (0.78)"}}
        }"#;
        let record = decode_node_graph(&object(blob), blob);
        assert_eq!(record.prompt, "second prompt");
        assert_eq!(record.negative_prompt, "bad");
        assert_eq!(record.seed, Some(77));
        assert_eq!(record.sampler, "euler");
        assert_eq!(record.scheduler, "simple");
        assert_eq!(record.steps, Some(25));
        assert_eq!(record.scale, Some(3.5));
        assert_eq!(record.model, "flux1-dev");
        assert_eq!((record.width, record.height), (Some(896), Some(1152)));
    }

    #[test]
    fn test_node_graph_text_fallback_and_links() {
        let blob = r#"{
            "1": {"inputs": {"text": "fallback prompt", "clip": ["4", 1]}},
            "2": {"inputs": {"width": 832, "height": ["7", 0], "steps": 20}}
        }"#;
        let record = decode_node_graph(&object(blob), blob);
        assert_eq!(record.prompt, "fallback prompt");
        assert_eq!(record.width, Some(832));
        assert_eq!(record.height, None);
        // steps only count when the node also carries a scheduler
        assert_eq!(record.steps, None);
    }
}
