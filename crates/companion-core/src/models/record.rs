//! The canonical, dialect-independent record of one image's generation parameters.

use super::resource::ResourceRef;
use crate::text::sanitize_prompt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Embedded-metadata dialects understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Fooocus JSON (`"Fooocus v"` marker).
    Fooocus,
    /// RuinedFooocus JSON.
    RuinedFooocus,
    /// Node-graph workflow JSON (ComfyUI).
    NodeGraph,
    /// `--keyword value` command line written by the batch tool itself.
    NativeBatch,
    /// Automatic1111-style caption text with a trailing parameter line.
    Caption,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Fooocus => "fooocus",
            Dialect::RuinedFooocus => "ruined_fooocus",
            Dialect::NodeGraph => "node_graph",
            Dialect::NativeBatch => "native_batch",
            Dialect::Caption => "caption",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image's decoded generation parameters.
///
/// `prompt_raw` / `negative_prompt_raw` are snapshots taken once by
/// [`MetadataRecord::set_prompts`]; filtering only ever touches `prompt`
/// and `negative_prompt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub source_path: PathBuf,
    pub source_name: String,
    pub dialect: Dialect,
    /// The embedded blob, verbatim.
    pub raw_metadata: String,

    pub prompt: String,
    prompt_raw: String,
    pub negative_prompt: String,
    negative_prompt_raw: String,
    #[serde(default)]
    prompts_set: bool,

    pub seed: Option<u64>,
    pub steps: Option<u32>,
    pub clip_skip: Option<u32>,
    pub scale: Option<f64>,
    pub strength: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,

    /// Model filename without extension.
    pub model: String,
    pub model_hash: String,
    /// Base model family (empty = unknown).
    pub base_model: String,
    pub sampler: String,
    pub scheduler: String,
    pub init_image: String,
    pub styles: String,

    pub resources: Vec<ResourceRef>,
}

impl MetadataRecord {
    pub fn new(dialect: Dialect, raw_metadata: impl Into<String>) -> Self {
        Self {
            source_path: PathBuf::new(),
            source_name: String::new(),
            dialect,
            raw_metadata: raw_metadata.into(),
            prompt: String::new(),
            prompt_raw: String::new(),
            negative_prompt: String::new(),
            negative_prompt_raw: String::new(),
            prompts_set: false,
            seed: None,
            steps: None,
            clip_skip: None,
            scale: None,
            strength: None,
            width: None,
            height: None,
            model: String::new(),
            model_hash: String::new(),
            base_model: String::new(),
            sampler: String::new(),
            scheduler: String::new(),
            init_image: String::new(),
            styles: String::new(),
            resources: Vec::new(),
        }
    }

    /// Attach the identity of the image this record was decoded from.
    pub fn with_source(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.source_path = path.to_path_buf();
        self
    }

    /// Store the extracted prompt pair.
    ///
    /// The unsanitized text becomes the raw snapshot and the sanitized text
    /// the working copy. Only the first call takes the snapshot.
    pub fn set_prompts(&mut self, prompt: &str, negative_prompt: &str) {
        if !self.prompts_set {
            self.prompt_raw = prompt.to_string();
            self.negative_prompt_raw = negative_prompt.to_string();
            self.prompts_set = true;
        }
        self.prompt = sanitize_prompt(prompt);
        self.negative_prompt = sanitize_prompt(negative_prompt);
    }

    pub fn prompt_raw(&self) -> &str {
        &self.prompt_raw
    }

    pub fn negative_prompt_raw(&self) -> &str {
        &self.negative_prompt_raw
    }

    /// Lowercased prompt pair used for duplicate detection.
    pub fn dedup_key(&self) -> (String, String) {
        (self.prompt.to_lowercase(), self.negative_prompt.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_prompts_snapshots_once() {
        let mut record = MetadataRecord::new(Dialect::Caption, "blob");
        record.set_prompts("a cat ,,on a mat", "ugly");
        assert_eq!(record.prompt, "a cat, on a mat");
        assert_eq!(record.prompt_raw(), "a cat ,,on a mat");

        record.prompt = "changed".into();
        record.set_prompts("second", "");
        assert_eq!(record.prompt, "second");
        assert_eq!(record.prompt_raw(), "a cat ,,on a mat");
        assert_eq!(record.negative_prompt_raw(), "ugly");
    }

    #[test]
    fn test_empty_first_prompts_are_still_the_snapshot() {
        let mut record = MetadataRecord::new(Dialect::RuinedFooocus, "{}");
        record.set_prompts("", "");
        record.set_prompts("a cat", "dog");

        assert_eq!(record.prompt, "a cat");
        assert_eq!(record.negative_prompt, "dog");
        assert_eq!(record.prompt_raw(), "");
        assert_eq!(record.negative_prompt_raw(), "");
    }

    #[test]
    fn test_with_source() {
        let record = MetadataRecord::new(Dialect::NodeGraph, "{}").with_source("/imgs/a/01.png");
        assert_eq!(record.source_name, "01.png");
        assert_eq!(record.source_path, PathBuf::from("/imgs/a/01.png"));
    }
}
