//! Companion Core - decoding and normalizing AI image-generation metadata.
//!
//! This crate decodes the generation parameters that image tools embed in
//! their output, resolves the models and LoRAs they reference against the
//! Civitai registry (with a persistent lookup cache), infers each image's
//! base model, and normalizes the prompts into a batch prompt file.
//!
//! Reading images and extracting their metadata text is left to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use companion_core::{Companion, CompanionConfig, ImageBlob};
//!
//! #[tokio::main]
//! async fn main() -> companion_core::Result<()> {
//!     let config = CompanionConfig::load("companion.json".as_ref())?;
//!     let mut companion = Companion::builder(config).build()?;
//!
//!     let images = vec![ImageBlob::new("00001.png", "a cat\nSteps: 20, Seed: 1")];
//!     if let Some(path) = companion.run(images).await? {
//!         println!("Wrote {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod inference;
pub mod local;
pub mod models;
pub mod network;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod text;

mod api;

// Re-export commonly used types
pub use api::{Companion, CompanionBuilder, ImageBlob};
pub use cache::{CachedVersion, ResourceCache};
pub use config::{CompanionConfig, OutputSettings, PromptSettings, RegistrySettings};
pub use decoder::{decode, detect};
pub use error::{CompanionError, Result};
pub use models::{Dialect, MetadataRecord, ResourceKind, ResourceRef};
pub use network::{
    CivitaiClient, DynRateGate, DynRegistryClient, ExclusionList, IntervalGate, Lookup,
    RateGate, RegistryClient, RegistryVersion,
};
pub use output::BatchWriter;
pub use pipeline::{PipelineReport, PromptPipeline, WorkingCollection};
pub use resolver::ResourceResolver;
