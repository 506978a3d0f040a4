//! Prompt normalization over the whole working collection.
//!
//! # Stage Order
//! 1. Base-model allow list
//! 2. LoRA token path fix
//! 3. Missing LoRA token repair
//! 4. Step/scale limits and resolution snapping
//! 5. Sampler canonicalization
//! 6. Word filters (prompt, then negative prompt)
//! 7. Empty prompt removal
//! 8. Duplicate removal
//! 9. LoRA exclusion
//!
//! Later stages assume the earlier ones already ran; [`PromptPipeline::run`]
//! applies them in this order.

pub mod collection;
pub mod lora;
pub mod resolution;
pub mod sampler;

pub use collection::WorkingCollection;
pub use resolution::{snap_resolution, Family};
pub use sampler::canonical_sampler;

use crate::config::PromptSettings;
use crate::text::{sanitize_prompt, word_replace};
use std::collections::HashSet;
use tracing::{debug, info};

/// Counts of what each stage changed during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub base_filtered: usize,
    pub lora_paths_fixed: usize,
    pub lora_tokens_added: usize,
    pub limit_adjustments: usize,
    pub samplers_substituted: usize,
    pub filter_words_removed: usize,
    pub negative_filter_words_removed: usize,
    pub empty_removed: usize,
    pub duplicates_removed: usize,
    pub lora_tokens_removed: usize,
}

/// The normalization stages, configured once.
#[derive(Debug, Clone)]
pub struct PromptPipeline {
    settings: PromptSettings,
}

impl PromptPipeline {
    pub fn new(settings: PromptSettings) -> Self {
        Self {
            settings: settings.normalized(),
        }
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    /// Run every stage in order.
    pub fn run(&self, collection: &mut WorkingCollection) -> PipelineReport {
        let report = PipelineReport {
            base_filtered: self.filter_base_models(collection),
            lora_paths_fixed: self.fix_lora_paths(collection),
            lora_tokens_added: self.add_missing_lora_tokens(collection),
            limit_adjustments: self.enforce_limits(collection),
            samplers_substituted: self.verify_samplers(collection),
            filter_words_removed: self.remove_filter_words(collection),
            negative_filter_words_removed: self.remove_negative_filter_words(collection),
            empty_removed: self.remove_empty(collection),
            duplicates_removed: self.remove_duplicates(collection),
            lora_tokens_removed: self.remove_filtered_loras(collection),
        };
        info!("{} prompt(s) remain after normalization", collection.len());
        report
    }

    /// Drop records whose base model is not on the allow list (if any).
    pub fn filter_base_models(&self, collection: &mut WorkingCollection) -> usize {
        let allowed = &self.settings.only_include_base;
        if allowed.is_empty() {
            return 0;
        }
        let removed = collection.retain(|r| allowed.contains(&r.base_model.trim().to_lowercase()));
        info!(
            "Removed {} prompt(s) not matching base models {:?}",
            removed, allowed
        );
        removed
    }

    pub fn fix_lora_paths(&self, collection: &mut WorkingCollection) -> usize {
        let mut fixed = 0;
        for record in collection.iter_mut() {
            let (prompt, changed) = lora::strip_token_paths(&record.prompt);
            if changed > 0 {
                record.prompt = prompt;
                fixed += changed;
            }
        }
        info!("Fixed {} lora reference(s) containing paths", fixed);
        fixed
    }

    pub fn add_missing_lora_tokens(&self, collection: &mut WorkingCollection) -> usize {
        let mut added = 0;
        for record in collection.iter_mut() {
            added += lora::add_missing_tokens(&mut record.prompt, &record.resources);
        }
        info!("Added {} lora reference(s) missing from prompts", added);
        added
    }

    /// Clamp steps and scale to the configured bounds (0 = unbounded) and
    /// snap the resolution when enabled.
    pub fn enforce_limits(&self, collection: &mut WorkingCollection) -> usize {
        let s = &self.settings;
        let mut changes = 0;
        for record in collection.iter_mut() {
            if let Some(steps) = record.steps {
                let mut clamped = steps;
                if s.min_steps > 0 && clamped < s.min_steps {
                    clamped = s.min_steps;
                }
                if s.max_steps > 0 && clamped > s.max_steps {
                    clamped = s.max_steps;
                }
                if clamped != steps {
                    record.steps = Some(clamped);
                    changes += 1;
                }
            }

            if let Some(scale) = record.scale {
                let mut clamped = scale;
                if s.min_scale > 0.0 && clamped < s.min_scale {
                    clamped = s.min_scale;
                }
                if s.max_scale > 0.0 && clamped > s.max_scale {
                    clamped = s.max_scale;
                }
                if clamped != scale {
                    record.scale = Some(clamped);
                    changes += 1;
                }
            }

            if s.fix_resolution {
                if let (Some(w), Some(h)) = (record.width, record.height) {
                    let family = Family::from_base_model(&record.base_model);
                    let (nw, nh) = snap_resolution(w, h, family);
                    if (nw, nh) != (w, h) {
                        debug!("{}: {}x{} -> {}x{}", record.source_name, w, h, nw, nh);
                        record.width = Some(nw);
                        record.height = Some(nh);
                        changes += 1;
                    }
                }
            }
        }
        info!("Made {} adjustment(s) to prompt parameters", changes);
        changes
    }

    pub fn verify_samplers(&self, collection: &mut WorkingCollection) -> usize {
        let mut substituted = 0;
        for record in collection.iter_mut() {
            let canonical = canonical_sampler(&record.sampler);
            if record.sampler != canonical {
                record.sampler = canonical.to_string();
                substituted += 1;
            }
        }
        info!("Substituted {} unsupported sampler name(s)", substituted);
        substituted
    }

    pub fn remove_filter_words(&self, collection: &mut WorkingCollection) -> usize {
        let removed = filter_words(collection, &self.settings.word_filter, |r| &mut r.prompt);
        if !self.settings.word_filter.is_empty() {
            info!("Removed {} filter word occurrence(s) from prompts", removed);
        }
        removed
    }

    pub fn remove_negative_filter_words(&self, collection: &mut WorkingCollection) -> usize {
        let removed = filter_words(collection, &self.settings.negative_word_filter, |r| {
            &mut r.negative_prompt
        });
        if !self.settings.negative_word_filter.is_empty() {
            info!(
                "Removed {} filter word occurrence(s) from negative prompts",
                removed
            );
        }
        removed
    }

    /// Drop records whose prompt, without LoRA tokens, is shorter than the
    /// configured threshold.
    pub fn remove_empty(&self, collection: &mut WorkingCollection) -> usize {
        let threshold = self.settings.min_prompt_chars;
        let removed = collection
            .retain(|r| lora::without_tokens(&r.prompt).trim().chars().count() >= threshold);
        info!(
            "Removed {} prompt(s) shorter than {} character(s)",
            removed, threshold
        );
        removed
    }

    /// Keep the first record of every case-insensitive prompt pair.
    pub fn remove_duplicates(&self, collection: &mut WorkingCollection) -> usize {
        let mut seen = HashSet::new();
        let removed = collection.retain(|r| seen.insert(r.dedup_key()));
        info!("Removed {} duplicate prompt(s)", removed);
        removed
    }

    pub fn remove_filtered_loras(&self, collection: &mut WorkingCollection) -> usize {
        let names = &self.settings.lora_filter;
        if names.is_empty() {
            return 0;
        }
        let mut removed = 0;
        for record in collection.iter_mut() {
            let (prompt, count) = lora::remove_tokens(&record.prompt, names);
            if count > 0 {
                record.prompt = sanitize_prompt(&prompt);
                removed += count;
            }
        }
        info!("Removed {} unwanted lora reference(s) from prompts", removed);
        removed
    }
}

/// Remove each filter word from one text field of every record, re-sanitizing
/// a field after each change. Returns the number of changed fields.
fn filter_words(
    collection: &mut WorkingCollection,
    words: &[String],
    field: impl Fn(&mut crate::models::MetadataRecord) -> &mut String,
) -> usize {
    if words.is_empty() {
        return 0;
    }
    let mut changed = 0;
    for record in collection.iter_mut() {
        let text = field(record);
        for word in words {
            if !text.to_lowercase().contains(word.as_str()) {
                continue;
            }
            let filtered = sanitize_prompt(&word_replace(word, text));
            if filtered != *text {
                *text = filtered;
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dialect, MetadataRecord, ResourceKind, ResourceRef};

    fn record(path: &str, prompt: &str, negative: &str) -> MetadataRecord {
        let mut r = MetadataRecord::new(Dialect::Caption, "").with_source(path);
        r.set_prompts(prompt, negative);
        r
    }

    fn pipeline(settings: PromptSettings) -> PromptPipeline {
        PromptPipeline::new(settings)
    }

    #[test]
    fn test_base_model_filter() {
        let mut a = record("/a.png", "a long prompt", "");
        a.base_model = "SDXL 1.0".into();
        let b = record("/b.png", "another prompt", "");
        let mut collection: WorkingCollection = vec![a, b].into_iter().collect();

        let p = pipeline(PromptSettings {
            only_include_base: vec![" sdxl 1.0".into()],
            ..Default::default()
        });
        assert_eq!(p.filter_base_models(&mut collection), 1);
        assert_eq!(collection.iter().next().unwrap().source_name, "a.png");
    }

    #[test]
    fn test_limits() {
        let mut low = record("/low.png", "prompt one", "");
        low.steps = Some(5);
        low.scale = Some(2.0);
        let mut high = record("/high.png", "prompt two", "");
        high.steps = Some(50);
        high.scale = Some(12.0);
        let mut collection: WorkingCollection = vec![low, high].into_iter().collect();

        let p = pipeline(PromptSettings {
            min_steps: 10,
            max_steps: 30,
            min_scale: 3.0,
            max_scale: 9.0,
            fix_resolution: false,
            ..Default::default()
        });
        assert_eq!(p.enforce_limits(&mut collection), 4);
        let steps: Vec<_> = collection.iter().map(|r| r.steps).collect();
        assert_eq!(steps, vec![Some(10), Some(30)]);
        let scales: Vec<_> = collection.iter().map(|r| r.scale).collect();
        assert_eq!(scales, vec![Some(3.0), Some(9.0)]);
    }

    #[test]
    fn test_resolution_uses_base_model_family() {
        let mut sd15 = record("/a.png", "prompt one", "");
        sd15.base_model = "SD 1.5".into();
        sd15.width = Some(1000);
        sd15.height = Some(640);
        let mut collection: WorkingCollection = std::iter::once(sd15).collect();

        let p = pipeline(PromptSettings::default());
        assert_eq!(p.enforce_limits(&mut collection), 1);
        let r = collection.iter().next().unwrap();
        assert_eq!((r.width, r.height), (Some(768), Some(512)));
    }

    #[test]
    fn test_word_filters() {
        let r = record("/a.png", "nsfw, a girl, watermark", "nsfw, ugly");
        let mut collection: WorkingCollection = std::iter::once(r).collect();

        let p = pipeline(PromptSettings {
            word_filter: vec!["NSFW".into(), "watermark".into()],
            negative_word_filter: vec!["ugly".into()],
            ..Default::default()
        });
        assert_eq!(p.remove_filter_words(&mut collection), 2);
        assert_eq!(p.remove_negative_filter_words(&mut collection), 1);
        let r = collection.iter().next().unwrap();
        assert_eq!(r.prompt, "a girl");
        assert_eq!(r.negative_prompt, "nsfw");
        assert_eq!(r.prompt_raw(), "nsfw, a girl, watermark");
    }

    #[test]
    fn test_remove_empty_ignores_lora_tokens() {
        let short = record("/a.png", "<lora:detail:1> cat", "");
        let long = record("/b.png", "<lora:detail:1> a cat", "");
        let mut collection: WorkingCollection = vec![short, long].into_iter().collect();

        let p = pipeline(PromptSettings::default());
        assert_eq!(p.remove_empty(&mut collection), 1);
        assert_eq!(collection.iter().next().unwrap().source_name, "b.png");
    }

    #[test]
    fn test_duplicates_collapse_case_insensitively() {
        let a = record("/a.png", "A, B", "x");
        let b = record("/b.png", "a, b", "X");
        let c = record("/c.png", "a, b", "y");
        let mut collection: WorkingCollection = vec![a, b, c].into_iter().collect();

        let p = pipeline(PromptSettings::default());
        assert_eq!(p.remove_duplicates(&mut collection), 1);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_full_run() {
        let mut r = record("/a.png", "a knight <lora:chars\\armor:0.7>", "blurry");
        r.sampler = "dpmpp_2m_karras".into();
        r.steps = Some(80);
        let mut lora = ResourceRef::with_id(ResourceKind::Lora, "11").weight(0.5);
        lora.filename = "glow.safetensors".into();
        r.resources.push(lora);
        let dupe = record("/b.png", "A KNIGHT <lora:armor:0.7> <lora:glow:0.5>", "BLURRY");
        let mut collection: WorkingCollection = vec![r, dupe].into_iter().collect();

        let p = pipeline(PromptSettings {
            max_steps: 40,
            lora_filter: vec!["armor".into()],
            ..Default::default()
        });
        let report = p.run(&mut collection);

        assert_eq!(report.lora_paths_fixed, 1);
        assert_eq!(report.lora_tokens_added, 1);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.lora_tokens_removed, 1);
        let r = collection.iter().next().unwrap();
        assert_eq!(r.prompt, "a knight <lora:glow:0.5>");
        assert_eq!(r.sampler, "DPM++ 2M");
        assert_eq!(r.steps, Some(40));
    }
}
