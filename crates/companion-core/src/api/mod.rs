//! Main API entry point: the decode, resolve, infer, normalize and write flow.

mod builder;

pub use builder::CompanionBuilder;

use crate::config::CompanionConfig;
use crate::decoder;
use crate::error::Result;
use crate::inference::apply_inferred_base_model;
use crate::local;
use crate::models::{ResourceKind, ResourceRef};
use crate::network::ExclusionList;
use crate::output::BatchWriter;
use crate::pipeline::{PipelineReport, PromptPipeline, WorkingCollection};
use crate::resolver::ResourceResolver;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One image's embedded metadata, as handed over by the image source.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub path: PathBuf,
    /// Raw metadata text; empty when the image carried none.
    pub metadata: String,
}

impl ImageBlob {
    pub fn new(path: impl Into<PathBuf>, metadata: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata: metadata.into(),
        }
    }
}

/// Owns the working collection and every stage that operates on it.
///
/// Stages are meant to be called in order (`ingest`, `resolve_resources`,
/// `infer_base_models`, `normalize`, `write_output`); [`Companion::run`]
/// chains them.
pub struct Companion {
    pub(crate) config: CompanionConfig,
    pub(crate) resolver: ResourceResolver,
    pub(crate) pipeline: PromptPipeline,
    pub(crate) writer: BatchWriter,
    pub(crate) exclusions: ExclusionList,
    pub(crate) collection: WorkingCollection,
}

impl Companion {
    pub fn builder(config: CompanionConfig) -> CompanionBuilder {
        CompanionBuilder::new(config)
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    pub fn collection(&self) -> &WorkingCollection {
        &self.collection
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    /// Decode every image into the working collection. Returns the number
    /// of records added or replaced.
    pub fn ingest(&mut self, images: impl IntoIterator<Item = ImageBlob>) -> usize {
        let mut decoded = 0;
        for image in images {
            match decoder::decode(&image.metadata) {
                Some(record) => {
                    self.collection.insert(record.with_source(&image.path));
                    decoded += 1;
                }
                None => warn!("No metadata found in {}; skipping", image.path.display()),
            }
        }
        info!("Decoded metadata from {} image(s)", decoded);
        decoded
    }

    /// Complete every resource reference, then let the registry's kind win
    /// over the decoded one.
    pub async fn resolve_resources(&mut self) {
        let before = self.resolver.remote_calls();
        let mut reconciled = 0;
        for record in self.collection.iter_mut() {
            self.resolver.resolve_all(&mut record.resources).await;
            for resource in record.resources.iter_mut() {
                if !resource.registry_id.is_empty() && self.resolver.reconcile_kind(resource) {
                    reconciled += 1;
                }
            }
        }
        info!(
            "Resolved resources with {} remote lookup(s); {} kind(s) corrected",
            self.resolver.remote_calls() - before,
            reconciled
        );
    }

    /// Assign a base model to every record where evidence exists.
    pub async fn infer_base_models(&mut self) -> usize {
        let mut inferred = 0;
        for record in self.collection.iter_mut() {
            if apply_inferred_base_model(&mut self.resolver, record).await {
                inferred += 1;
            } else {
                debug!("No base model evidence for {}", record.source_name);
            }
        }
        info!("Determined base model for {} prompt(s)", inferred);
        inferred
    }

    /// Run the normalization pipeline, then group by model if configured.
    pub fn normalize(&mut self) -> PipelineReport {
        let report = self.pipeline.run(&mut self.collection);
        if self.config.prompts.order_by_model {
            self.collection.order_by_model();
        }
        report
    }

    pub fn write_output(&self) -> Result<Option<PathBuf>> {
        self.writer.write(&self.collection)
    }

    /// Referenced models, LoRAs and embeddings not found under `resource_dir`
    /// and not excluded from downloading.
    pub fn missing_resources(&self, resource_dir: &Path) -> Result<Vec<ResourceRef>> {
        let referenced = self.collection.referenced_resources(&[
            ResourceKind::Model,
            ResourceKind::Lora,
            ResourceKind::Embed,
        ]);
        let local = local::scan_resources(resource_dir)?;
        Ok(local::missing_resources(&referenced, &local, &self.exclusions))
    }

    /// Every stage in order. Returns the written file, if any.
    pub async fn run(
        &mut self,
        images: impl IntoIterator<Item = ImageBlob>,
    ) -> Result<Option<PathBuf>> {
        self.ingest(images);
        self.resolve_resources().await;
        self.infer_base_models().await;
        self.normalize();
        for (label, count) in self.collection.base_model_breakdown() {
            debug!("{}: {}", label, count);
        }
        self.write_output()
    }
}
