//! Referenced resources (models, LoRAs, embeddings, VAEs).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a referenced resource.
///
/// `checkpoint` parses to [`ResourceKind::Model`]. Kinds that arrive
/// verbatim from a `Hashes:` segment and are not recognized are kept as
/// [`ResourceKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Model,
    Lora,
    Embed,
    Vae,
    Other(String),
}

impl ResourceKind {
    /// Parse a kind hint found in embedded metadata.
    pub fn parse(hint: &str) -> Self {
        match hint.trim().to_lowercase().as_str() {
            "model" | "checkpoint" => ResourceKind::Model,
            "lora" => ResourceKind::Lora,
            "embed" | "embedding" => ResourceKind::Embed,
            "vae" => ResourceKind::Vae,
            other => ResourceKind::Other(other.to_string()),
        }
    }

    /// Map a registry-side type to a kind.
    ///
    /// Registry types seen so far: Checkpoint, LORA, LoCon, DoRA,
    /// TextualInversion, VAE. Returns `None` for types with no local
    /// equivalent.
    pub fn from_registry(kind: &str) -> Option<Self> {
        match kind.trim().to_lowercase().as_str() {
            "checkpoint" | "model" => Some(ResourceKind::Model),
            "lora" | "locon" | "dora" => Some(ResourceKind::Lora),
            "textualinversion" | "embed" => Some(ResourceKind::Embed),
            "vae" => Some(ResourceKind::Vae),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Model => "model",
            ResourceKind::Lora => "lora",
            ResourceKind::Embed => "embed",
            ResourceKind::Vae => "vae",
            ResourceKind::Other(s) => s,
        }
    }

    /// True for LoRAs and for any unrecognized kind mentioning "lora".
    pub fn is_lora(&self) -> bool {
        match self {
            ResourceKind::Lora => true,
            ResourceKind::Other(s) => s.contains("lora"),
            _ => false,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single model/LoRA/embedding/VAE referenced by an image.
///
/// Resolvable only when `registry_id` or `content_hash` is non-empty.
/// `filename` is only trustworthy after a resolver pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub registry_id: String,
    pub content_hash: String,
    pub filename: String,
    pub display_name: String,
    pub base_model: String,
    pub weight: f64,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            registry_id: String::new(),
            content_hash: String::new(),
            filename: String::new(),
            display_name: String::new(),
            base_model: String::new(),
            weight: 1.0,
        }
    }

    /// Reference known by its registry version id.
    pub fn with_id(kind: ResourceKind, registry_id: impl Into<String>) -> Self {
        Self {
            registry_id: registry_id.into(),
            ..Self::new(kind)
        }
    }

    /// Reference known only by the hash of its file.
    pub fn with_hash(kind: ResourceKind, content_hash: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            ..Self::new(kind)
        }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_resolvable(&self) -> bool {
        !self.registry_id.is_empty() || !self.content_hash.is_empty()
    }

    pub fn is_resolved(&self) -> bool {
        !self.filename.is_empty()
    }
}

/// Render a LoRA weight the way prompt files expect (`1.0`, `0.75`).
pub fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 && weight.is_finite() {
        format!("{:.1}", weight)
    } else {
        weight.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(ResourceKind::parse("Checkpoint"), ResourceKind::Model);
        assert_eq!(ResourceKind::parse("lora"), ResourceKind::Lora);
        assert_eq!(
            ResourceKind::parse("hypernet"),
            ResourceKind::Other("hypernet".into())
        );
    }

    #[test]
    fn test_registry_kind_normalization() {
        assert_eq!(ResourceKind::from_registry("LoCon"), Some(ResourceKind::Lora));
        assert_eq!(ResourceKind::from_registry("DoRA"), Some(ResourceKind::Lora));
        assert_eq!(
            ResourceKind::from_registry("TextualInversion"),
            Some(ResourceKind::Embed)
        );
        assert_eq!(ResourceKind::from_registry("Checkpoint"), Some(ResourceKind::Model));
        assert_eq!(ResourceKind::from_registry("VAE"), Some(ResourceKind::Vae));
        assert_eq!(ResourceKind::from_registry("Poses"), None);
    }

    #[test]
    fn test_is_lora() {
        assert!(ResourceKind::Lora.is_lora());
        assert!(ResourceKind::Other("lora:detail".into()).is_lora());
        assert!(!ResourceKind::Embed.is_lora());
    }

    #[test]
    fn test_resolvable() {
        assert!(!ResourceRef::new(ResourceKind::Lora).is_resolvable());
        assert!(ResourceRef::with_hash(ResourceKind::Lora, "abc").is_resolvable());
        assert!(ResourceRef::with_id(ResourceKind::Model, "123").is_resolvable());
    }

    #[test]
    fn test_format_weight() {
        assert_eq!(format_weight(1.0), "1.0");
        assert_eq!(format_weight(0.75), "0.75");
    }
}
