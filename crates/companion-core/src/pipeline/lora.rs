//! `<lora:NAME:weight>` prompt token handling.

use crate::models::{format_weight, ResourceRef};
use crate::text::{file_stem, last_path_segment};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A LoRA token; group 1 is everything between `<lora:` and `>`.
static LORA_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<lora:([^>]*)>").unwrap());

/// Strip directory paths from every LoRA token name.
///
/// Returns the rewritten prompt and the number of tokens changed.
pub fn strip_token_paths(prompt: &str) -> (String, usize) {
    let mut changed = 0;
    let fixed = LORA_TOKEN.replace_all(prompt, |caps: &Captures| {
        let body = &caps[1];
        let trimmed = last_path_segment(body);
        if trimmed.len() != body.len() {
            changed += 1;
        }
        format!("<lora:{}>", trimmed)
    });
    (fixed.into_owned(), changed)
}

/// Append a token for every resolved LoRA resource the prompt does not
/// reference yet. Matching is a case-insensitive `<lora:stem` search, so
/// repeating the repair adds nothing.
///
/// Returns the number of tokens added.
pub fn add_missing_tokens(prompt: &mut String, resources: &[ResourceRef]) -> usize {
    let mut added = 0;
    for resource in resources
        .iter()
        .filter(|r| r.kind.is_lora() && r.is_resolved())
    {
        let stem = file_stem(&resource.filename);
        let prefix = format!("<lora:{}", stem);
        if prompt.to_lowercase().contains(&prefix.to_lowercase()) {
            continue;
        }
        prompt.push_str(&format!(" {}:{}>", prefix, format_weight(resource.weight)));
        added += 1;
    }
    added
}

/// Remove every token whose name (lowercased, trimmed) is in `names`.
///
/// Returns the rewritten prompt and the number of tokens removed.
pub fn remove_tokens(prompt: &str, names: &[String]) -> (String, usize) {
    if names.is_empty() {
        return (prompt.to_string(), 0);
    }
    let mut removed = 0;
    let filtered = LORA_TOKEN.replace_all(prompt, |caps: &Captures| {
        let name = caps[1].split(':').next().unwrap_or_default().trim().to_lowercase();
        if names.iter().any(|n| *n == name) {
            removed += 1;
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    (filtered.into_owned(), removed)
}

/// Prompt text with every LoRA token removed.
pub fn without_tokens(prompt: &str) -> String {
    LORA_TOKEN.replace_all(prompt, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;

    fn resolved_lora(filename: &str, weight: f64) -> ResourceRef {
        let mut r = ResourceRef::with_id(ResourceKind::Lora, "1").weight(weight);
        r.filename = filename.into();
        r
    }

    #[test]
    fn test_strip_token_paths() {
        let (fixed, changed) =
            strip_token_paths("a <lora:styles\\ink\\inkpunk:0.8>, b <lora:flat/detail:1> <lora:ok:1>");
        assert_eq!(fixed, "a <lora:inkpunk:0.8>, b <lora:detail:1> <lora:ok:1>");
        assert_eq!(changed, 2);
    }

    #[test]
    fn test_add_missing_tokens_is_idempotent() {
        let resources = vec![
            resolved_lora("foo.safetensors", 1.0),
            resolved_lora("Bar.safetensors", 0.6),
            ResourceRef::with_hash(ResourceKind::Lora, "unresolved"),
        ];
        let mut prompt = "a cat <lora:bar:0.6>".to_string();

        assert_eq!(add_missing_tokens(&mut prompt, &resources), 1);
        assert_eq!(prompt, "a cat <lora:bar:0.6> <lora:foo:1.0>");

        assert_eq!(add_missing_tokens(&mut prompt, &resources), 0);
        assert_eq!(prompt.matches("<lora:foo").count(), 1);
    }

    #[test]
    fn test_remove_tokens() {
        let names = vec!["detail_tweaker".to_string()];
        let (prompt, removed) =
            remove_tokens("a <lora:Detail_Tweaker:0.5>, b <lora:keep:1>", &names);
        assert_eq!(prompt, "a , b <lora:keep:1>");
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_without_tokens() {
        assert_eq!(without_tokens("<lora:a:1> <lora:b:1>").trim(), "");
        assert_eq!(without_tokens("cat <lora:a:1>"), "cat ");
    }
}
