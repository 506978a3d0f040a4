//! Base-model inference for decoded records.

use crate::models::{MetadataRecord, ResourceKind};
use crate::resolver::ResourceResolver;
use tracing::debug;

/// Prompt tag convention used by one model family.
const PONY_PROMPT_TAG: &str = "score_";
const PONY_BASE_MODEL: &str = "Pony";

/// Determine the base model family a record was generated with.
///
/// # Evidence Order
/// 1. The record's own model hash, if it resolves to a registry version
///    with a filename, supplies that version's base model
/// 2. Exactly one checkpoint resource carrying a base model supplies it
///    (several candidates are ambiguous and supply nothing)
/// 3. A prompt containing `score_` is assumed to be Pony
///
/// Returns an empty string when nothing applies.
pub async fn infer_base_model(resolver: &mut ResourceResolver, record: &MetadataRecord) -> String {
    if !record.model_hash.is_empty() {
        if let Some(id) = resolver.resolve_hash(&record.model_hash).await {
            if let Some(version) = resolver.resolve_version(&id).await {
                if !version.base_model.is_empty() {
                    return version.base_model;
                }
            }
        }
    }

    let candidates: Vec<&str> = record
        .resources
        .iter()
        .filter(|r| r.kind == ResourceKind::Model && !r.base_model.is_empty())
        .map(|r| r.base_model.as_str())
        .collect();
    match candidates.as_slice() {
        [only] => return only.to_string(),
        [] => {}
        _ => debug!(
            "{} checkpoint resources in {}; not inferring from resources",
            candidates.len(),
            record.source_name
        ),
    }

    if record.prompt.contains(PONY_PROMPT_TAG) {
        return PONY_BASE_MODEL.to_string();
    }
    String::new()
}

/// Infer and store a record's base model. Only a non-empty result
/// overwrites the existing value.
pub async fn apply_inferred_base_model(
    resolver: &mut ResourceResolver,
    record: &mut MetadataRecord,
) -> bool {
    let base = infer_base_model(resolver, record).await;
    if base.is_empty() {
        return false;
    }
    record.base_model = base;
    true
}
