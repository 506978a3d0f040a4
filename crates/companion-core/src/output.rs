//! Batch prompt file rendering.
//!
//! Output is either the built-in layout or a user template whose bracketed
//! placeholders are substituted per record. Both start with the same banner
//! and may be wrapped by header/footer files.

use crate::config::{AppConfig, OutputSettings};
use crate::error::{CompanionError, Result};
use crate::models::{format_weight, MetadataRecord};
use crate::pipeline::WorkingCollection;
use chrono::{DateTime, Local};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};

const RULE: &str = "#######################################################################################################";

/// Every template placeholder, matched case-insensitively in one pass.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\[(ref_num|filename|filepath|raw_metadata|model|seed|sampler|clip_skip|width|height|steps|scale|neg_prompt_raw|neg_prompt|prompt_raw|prompt|base_model|model_hash)\]",
    )
    .unwrap()
});

/// Writes the surviving records as one batch prompt file.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    settings: OutputSettings,
    filename_suffix: String,
}

impl BatchWriter {
    pub fn new(settings: OutputSettings, filename_suffix: impl Into<String>) -> Self {
        Self {
            settings,
            filename_suffix: filename_suffix.into(),
        }
    }

    /// Destination path with `[date]` and `[time]` expanded.
    pub fn output_path(&self, now: DateTime<Local>) -> PathBuf {
        let Some(save_as) = self.settings.save_as.as_deref().filter(|s| !s.is_empty()) else {
            return PathBuf::from(AppConfig::DEFAULT_OUTPUT_FILENAME);
        };
        let expanded = crate::text::ireplace("[date]", &now.format("%Y-%m-%d").to_string(), save_as);
        PathBuf::from(crate::text::ireplace(
            "[time]",
            &now.format("%H-%M-%S").to_string(),
            &expanded,
        ))
    }

    /// Full file contents for `collection`.
    pub fn render(&self, collection: &WorkingCollection, now: DateTime<Local>) -> String {
        let mut out = String::new();
        if let Some(header) = read_optional(self.settings.header.as_deref(), "header") {
            out.push_str(&header);
        }

        out.push_str(&banner(collection.len(), now));
        match self.template() {
            Some(template) => {
                for (i, record) in collection.iter().enumerate() {
                    out.push('\n');
                    out.push_str(&fill_template(&template, i + 1, record));
                    out.push('\n');
                }
            }
            None => {
                for (i, record) in collection.iter().enumerate() {
                    self.push_default_block(&mut out, i + 1, record);
                }
            }
        }

        if let Some(footer) = read_optional(self.settings.footer.as_deref(), "footer") {
            out.push_str(&footer);
        }
        out
    }

    /// Render and write the batch file. An empty collection writes nothing
    /// and returns `None`.
    pub fn write(&self, collection: &WorkingCollection) -> Result<Option<PathBuf>> {
        if collection.is_empty() {
            warn!("No usable metadata to output; skipping prompt file write");
            return Ok(None);
        }

        let now = Local::now();
        let path = self.output_path(now);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CompanionError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        fs::write(&path, self.render(collection, now))
            .map_err(|e| CompanionError::io_with_path(e, &path))?;
        info!("{} prompt(s) saved as {}", collection.len(), path.display());
        Ok(Some(path))
    }

    /// Template text, or `None` for the built-in layout.
    fn template(&self) -> Option<String> {
        let path = self.settings.template.as_deref()?;
        match fs::read_to_string(path) {
            Ok(template) => {
                info!("Writing prompts using template {}", path.display());
                Some(template)
            }
            Err(e) => {
                warn!(
                    "Prompt template {} is unreadable ({}); using built-in layout",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    fn push_default_block(&self, out: &mut String, index: usize, record: &MetadataRecord) {
        out.push_str(&format!(
            "\n{RULE}\n# PROMPT {index:05}\n# Extracted from: {}\n# Raw metadata below:\n#{}\n\n{RULE}\n\n",
            record.source_name,
            record.raw_metadata.replace('\n', "\n#"),
        ));
        out.push_str(&format!(
            "!FILENAME = {index:05}-{}\n\
             #!CKPT_FILE = {}\n\
             #!SEED = {}\n\
             #!SAMPLER = {}\n\
             #!CLIP_SKIP = {}\n\
             #!WIDTH = {}\n\
             #!HEIGHT = {}\n\
             !STEPS = {}\n\
             !SCALE = {}\n",
            self.filename_suffix,
            record.model,
            opt(record.seed),
            record.sampler,
            opt(record.clip_skip),
            opt(record.width),
            opt(record.height),
            opt(record.steps),
            scale(record.scale),
        ));
        out.push_str(&format!(
            "\n!NEG_PROMPT = {}\n\n{}\n",
            record.negative_prompt, record.prompt
        ));
    }
}

fn banner(count: usize, now: DateTime<Local>) -> String {
    format!(
        "{RULE}\n# {count} unique prompts from metadata extracted from civitai.com images.\n# Created on {} at {}.\n{RULE}\n",
        now.format("%Y-%m-%d"),
        now.format("%H:%M:%S"),
    )
}

fn fill_template(template: &str, index: usize, record: &MetadataRecord) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            match caps[1].to_lowercase().as_str() {
                "ref_num" => format!("{:05}", index),
                "filename" => record.source_name.clone(),
                "filepath" => record.source_path.display().to_string(),
                "raw_metadata" => record.raw_metadata.replace('\n', "\n#"),
                "model" => record.model.clone(),
                "seed" => opt(record.seed),
                "sampler" => record.sampler.clone(),
                "clip_skip" => opt(record.clip_skip),
                "width" => opt(record.width),
                "height" => opt(record.height),
                "steps" => opt(record.steps),
                "scale" => scale(record.scale),
                "neg_prompt" => record.negative_prompt.clone(),
                "neg_prompt_raw" => record.negative_prompt_raw().to_string(),
                "prompt" => record.prompt.clone(),
                "prompt_raw" => record.prompt_raw().to_string(),
                "base_model" => record.base_model.clone(),
                "model_hash" => record.model_hash.clone(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn scale(value: Option<f64>) -> String {
    value.map(format_weight).unwrap_or_default()
}

/// Contents of an optional header/footer file; a missing file is skipped.
fn read_optional(path: Option<&Path>, label: &str) -> Option<String> {
    let path = path?;
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) => {
            warn!("Output {} {} is unreadable ({}); ignoring it", label, path.display(), e);
            None
        }
    }
}
