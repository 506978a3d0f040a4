//! Centralized configuration for the companion library.
//!
//! Constant groups hold fixed tunables (file names, registry endpoints,
//! defaults). `CompanionConfig` holds the user-facing options and can be
//! loaded from a JSON file.

use crate::error::{CompanionError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const DEFAULT_OUTPUT_FILENAME: &'static str = "output.prompts";
    pub const DEFAULT_EMPTY_PROMPT_THRESHOLD: usize = 5;
    pub const DEFAULT_SAMPLER: &'static str = "DPM++ 2M";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const CIVITAI_API_BASE: &'static str = "https://civitai.com/api/v1";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);
    pub const USER_AGENT: &'static str = "civitai-companion/0.3";
}

/// Shared directory and file name configuration.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const VERSION_CACHE_FILENAME: &'static str = "civitai_version_ids.txt";
    pub const HASH_CACHE_FILENAME: &'static str = "civitai_hash_ids.txt";
    pub const EXCLUSION_FILENAME: &'static str = "do_not_download.txt";
}

/// Options for talking to the remote registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RegistrySettings {
    /// Bearer token sent with registry requests (empty = anonymous).
    pub api_key: String,
    /// Minimum seconds between remote calls.
    pub request_delay_secs: f64,
    /// Directory holding the persistent lookup caches.
    pub cache_dir: PathBuf,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            request_delay_secs: NetworkConfig::DEFAULT_REQUEST_DELAY.as_secs_f64(),
            cache_dir: PathBuf::from(PathsConfig::CACHE_DIR_NAME),
        }
    }
}

impl RegistrySettings {
    pub fn request_delay(&self) -> Duration {
        if self.request_delay_secs.is_finite() && self.request_delay_secs > 0.0 {
            Duration::from_secs_f64(self.request_delay_secs)
        } else {
            Duration::ZERO
        }
    }
}

/// Options for the prompt normalization pipeline.
///
/// Bounds of 0 mean "no bound on that side". Lists hold lowercased,
/// trimmed entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PromptSettings {
    /// Appended to each record's generated output filename.
    pub filename_suffix: String,
    pub min_steps: u32,
    pub max_steps: u32,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Snap width/height to an officially supported resolution.
    pub fix_resolution: bool,
    /// Base models to keep (empty = keep all).
    #[serde(deserialize_with = "list_or_csv")]
    pub only_include_base: Vec<String>,
    #[serde(deserialize_with = "list_or_csv")]
    pub word_filter: Vec<String>,
    #[serde(deserialize_with = "list_or_csv")]
    pub negative_word_filter: Vec<String>,
    /// LoRA names (filename without path or extension) to strip from prompts.
    #[serde(deserialize_with = "list_or_csv")]
    pub lora_filter: Vec<String>,
    /// Prompts shorter than this (LoRA tokens excluded) are dropped.
    pub min_prompt_chars: usize,
    /// Group output records by model.
    pub order_by_model: bool,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            filename_suffix: String::new(),
            min_steps: 0,
            max_steps: 0,
            min_scale: 0.0,
            max_scale: 0.0,
            fix_resolution: true,
            only_include_base: Vec::new(),
            word_filter: Vec::new(),
            negative_word_filter: Vec::new(),
            lora_filter: Vec::new(),
            min_prompt_chars: AppConfig::DEFAULT_EMPTY_PROMPT_THRESHOLD,
            order_by_model: false,
        }
    }
}

impl PromptSettings {
    /// Lowercase and trim every list entry, dropping empty ones.
    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.only_include_base,
            &mut self.word_filter,
            &mut self.negative_word_filter,
            &mut self.lora_filter,
        ] {
            *list = list
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        self
    }
}

/// Options for the batch prompt file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct OutputSettings {
    /// Template file with bracketed placeholders (None = built-in layout).
    pub template: Option<PathBuf>,
    pub header: Option<PathBuf>,
    pub footer: Option<PathBuf>,
    /// Output path; may contain `[date]` and `[time]`.
    pub save_as: Option<String>,
}

/// All user-facing options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CompanionConfig {
    pub registry: RegistrySettings,
    pub prompts: PromptSettings,
    pub output: OutputSettings,
}

impl CompanionConfig {
    /// Load options from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CompanionError::FileNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CompanionError::io_with_path(e, path))?;
        let mut config: CompanionConfig =
            serde_json::from_str(&contents).map_err(|e| CompanionError::Config {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?;
        config.prompts = config.prompts.normalized();
        Ok(config)
    }
}

/// Split a comma-separated option into lowercased, trimmed entries.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accept a list option either as a JSON array or as one comma-separated string.
fn list_or_csv<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOption {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ListOption::deserialize(deserializer)? {
        ListOption::List(items) => items,
        ListOption::Csv(value) => parse_list(&value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("Pony, SDXL 1.0 ,,"), vec!["pony", "sdxl 1.0"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = CompanionConfig::default();
        assert!(config.prompts.fix_resolution);
        assert_eq!(config.prompts.min_prompt_chars, 5);
        assert_eq!(config.registry.request_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_partial_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"prompts": {"max_steps": 30, "lora_filter": [" Detail_Tweaker "]}}"#,
        )
        .unwrap();

        let config = CompanionConfig::load(&path).unwrap();
        assert_eq!(config.prompts.max_steps, 30);
        assert_eq!(config.prompts.lora_filter, vec!["detail_tweaker"]);
        assert!(config.prompts.fix_resolution);
        assert!(config.output.template.is_none());
    }

    #[test]
    fn test_load_comma_separated_lists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"prompts": {"word_filter": "NSFW, watermark ,", "only_include_base": ["Pony"]}}"#,
        )
        .unwrap();

        let config = CompanionConfig::load(&path).unwrap();
        assert_eq!(config.prompts.word_filter, vec!["nsfw", "watermark"]);
        assert_eq!(config.prompts.only_include_base, vec!["pony"]);
        assert!(config.prompts.lora_filter.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = CompanionConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(CompanionError::FileNotFound(_))));
    }

    #[test]
    fn test_negative_delay_disables_gate() {
        let settings = RegistrySettings {
            request_delay_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(settings.request_delay(), Duration::ZERO);
    }
}
