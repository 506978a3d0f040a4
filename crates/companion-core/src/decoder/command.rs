//! Native batch dialect: `--keyword value` command lines.

use super::{parse_float, parse_u32, parse_uint};
use crate::models::{Dialect, MetadataRecord};
use crate::text::{extract_model_filename, extract_model_hash, last_path_segment};

/// Older command lines carry upscale details after this marker.
const UPSCALE_MARKER: &str = "(upscaled";

/// Value of `--keyword`: the text after its first occurrence up to the next
/// `--` or the end of the command.
///
/// The keyword must be followed by whitespace, a quote or the end, so `--W`
/// never matches a longer keyword.
fn keyword_value<'a>(command: &'a str, keyword: &str) -> Option<&'a str> {
    let token = format!("--{keyword}");
    command.match_indices(&token).find_map(|(start, _)| {
        let rest = &command[start + token.len()..];
        match rest.chars().next() {
            None => Some(""),
            Some(c) if c.is_whitespace() || c == '"' => {
                Some(rest.split("--").next().unwrap_or_default().trim())
            }
            _ => None,
        }
    })
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches('"')
}

/// Prompt of a command without `--prompt`: the leading text before the
/// first keyword.
fn leading_prompt(command: &str) -> String {
    let lead = command.split("--").next().unwrap_or_default().trim();
    let lead = lead.strip_suffix('"').unwrap_or(lead);
    lead.replace('\\', "")
}

pub(super) fn decode(text: &str, raw: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(Dialect::NativeBatch, raw);

    let command = text.trim_matches('"');
    let command = command
        .split_once(UPSCALE_MARKER)
        .map_or(command, |(before, _)| before);

    let prompt = match keyword_value(command, "prompt") {
        Some(p) => unquote(p).to_string(),
        None => leading_prompt(command),
    };
    let negative = keyword_value(command, "neg_prompt").map(unquote).unwrap_or_default();
    record.set_prompts(&prompt, negative);

    if let Some(ckpt) = keyword_value(command, "ckpt").map(unquote) {
        record.model = extract_model_filename(ckpt);
        record.model_hash = extract_model_hash(ckpt);
    }
    if let Some(v) = keyword_value(command, "sampler") {
        record.sampler = v.to_string();
    }
    record.steps = keyword_value(command, "ddim_steps").and_then(parse_u32);
    record.scale = keyword_value(command, "scale").and_then(parse_float);
    record.seed = keyword_value(command, "seed").and_then(parse_uint);
    record.width = keyword_value(command, "W").and_then(parse_u32);
    record.height = keyword_value(command, "H").and_then(parse_u32);
    record.strength = keyword_value(command, "strength").and_then(parse_float);
    record.clip_skip = keyword_value(command, "clip-skip").and_then(parse_u32);
    if let Some(v) = keyword_value(command, "init-img") {
        let path = v.replace("../", "");
        record.init_image = last_path_segment(unquote(&path)).to_string();
    }
    if let Some(v) = keyword_value(command, "styles") {
        record.styles = unquote(v).to_string();
    }

    record
}
