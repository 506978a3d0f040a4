//! Caption dialect: free prompt text followed by a `Key: value, ...` line.

use super::{parse_float, parse_u32, parse_uint, resources};
use crate::models::{Dialect, MetadataRecord};
use crate::text::extract_model_filename;

const NEGATIVE_MARKER: &str = "Negative prompt:";
const STEPS_KEY: &str = "Steps:";

/// Split a caption into (prompt, negative prompt, parameter line).
fn split_sections(text: &str) -> (String, String, &str) {
    if let Some((before, after)) = text.split_once(NEGATIVE_MARKER) {
        let prompt = before.trim().replace('\\', "");
        let after = after.trim();

        let (negative, params) = if after.starts_with(STEPS_KEY) {
            ("", after)
        } else if let Some(i) = after.find("\nSteps:") {
            (&after[..i], &after[i + 1..])
        } else if let Some((line, rest)) = after.split_once('\n') {
            (line, rest)
        } else if let Some(i) = after.find(STEPS_KEY) {
            // Single-line caption: negative prompt runs into the parameters
            (after[..i].trim_end().trim_end_matches(','), &after[i..])
        } else {
            (after, "")
        };

        let negative = negative.trim().trim_matches('"').to_string();
        return (prompt, negative, params);
    }

    match text.rsplit_once('\n') {
        Some((prompt, params)) => (prompt.trim().to_string(), String::new(), params),
        None => (String::new(), String::new(), text),
    }
}

/// Value of `key` in a flat parameter line: the text after the key up to
/// the next comma. Lines without any comma carry no values.
fn param<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    if !line.contains(',') {
        return None;
    }
    let (_, rest) = line.split_once(key)?;
    rest.split(',').next().map(str::trim)
}

fn strip_sampler_qualifiers(sampler: &str) -> &str {
    let sampler = sampler.strip_suffix(" Exponential").unwrap_or(sampler);
    sampler.strip_suffix(" Karras").unwrap_or(sampler)
}

/// Fill record fields from a parameter line.
fn apply_params(record: &mut MetadataRecord, line: &str) {
    if let Some(v) = param(line, "Steps:") {
        record.steps = parse_u32(v);
    }
    if let Some(v) = param(line, "CFG scale:").or_else(|| param(line, "CFG Scale:")) {
        record.scale = parse_float(v);
    }
    if let Some(v) = param(line, "Denoising strength:") {
        record.strength = parse_float(v);
    }
    if let Some((w, h)) = param(line, "Size:").and_then(|v| v.split_once('x')) {
        record.width = parse_u32(w);
        record.height = parse_u32(h);
    }
    if let Some(v) = param(line, "Clip skip:") {
        record.clip_skip = parse_u32(v);
    }
    if let Some(v) = param(line, "Sampler:") {
        record.sampler = strip_sampler_qualifiers(v).to_string();
    }
    if let Some(v) = param(line, "Seed:") {
        record.seed = parse_uint(v);
    }
    if let Some(v) = param(line, "Model:") {
        record.model = extract_model_filename(v);
    }
    if let Some(v) = param(line, "Model hash:") {
        record.model_hash = v.to_string();
    }
}

pub(super) fn decode(text: &str, raw: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(Dialect::Caption, raw);
    let (prompt, negative, params) = split_sections(text);
    record.set_prompts(&prompt, &negative);
    apply_params(&mut record, params);
    record.resources = resources::extract(params);
    record
}
