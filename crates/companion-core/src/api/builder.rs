//! Builder for configuring Companion initialization.

use std::sync::Arc;

use crate::api::Companion;
use crate::cache::ResourceCache;
use crate::config::{CompanionConfig, PathsConfig};
use crate::error::Result;
use crate::network::{
    CivitaiClient, DynRateGate, DynRegistryClient, ExclusionList, IntervalGate,
};
use crate::output::BatchWriter;
use crate::pipeline::{PromptPipeline, WorkingCollection};
use crate::resolver::ResourceResolver;

/// Builder for configuring [`Companion`] initialization.
///
/// # Example
///
/// ```rust,ignore
/// use companion_core::{Companion, CompanionConfig};
///
/// let companion = Companion::builder(CompanionConfig::default())
///     .in_memory_cache(true)
///     .build()?;
/// ```
pub struct CompanionBuilder {
    config: CompanionConfig,
    in_memory_cache: bool,
    client: Option<DynRegistryClient>,
    gate: Option<DynRateGate>,
    exclusions: Option<ExclusionList>,
}

impl CompanionBuilder {
    pub fn new(config: CompanionConfig) -> Self {
        Self {
            config,
            in_memory_cache: false,
            client: None,
            gate: None,
            exclusions: None,
        }
    }

    /// Keep lookup caches in memory only instead of under the cache dir.
    ///
    /// Default: `false`
    pub fn in_memory_cache(mut self, enable: bool) -> Self {
        self.in_memory_cache = enable;
        self
    }

    /// Use a custom registry client.
    ///
    /// Default: [`CivitaiClient`] with the configured API key.
    pub fn with_client(mut self, client: DynRegistryClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Use a custom rate gate.
    ///
    /// Default: [`IntervalGate`] with the configured request delay.
    pub fn with_gate(mut self, gate: DynRateGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Use an explicit exclusion list instead of the one in the cache dir.
    pub fn with_exclusions(mut self, exclusions: ExclusionList) -> Self {
        self.exclusions = Some(exclusions);
        self
    }

    /// Build the Companion instance.
    pub fn build(self) -> Result<Companion> {
        let registry = &self.config.registry;

        let cache = if self.in_memory_cache {
            ResourceCache::in_memory()
        } else {
            ResourceCache::open(&registry.cache_dir)?
        };

        let exclusions = match self.exclusions {
            Some(list) => list,
            None if self.in_memory_cache => ExclusionList::default(),
            None => ExclusionList::load(&registry.cache_dir.join(PathsConfig::EXCLUSION_FILENAME))?,
        };

        let client = match self.client {
            Some(client) => client,
            None => Arc::new(CivitaiClient::new(registry.api_key.clone())?) as DynRegistryClient,
        };
        let gate = self
            .gate
            .unwrap_or_else(|| Arc::new(IntervalGate::new(registry.request_delay())) as DynRateGate);

        let pipeline = PromptPipeline::new(self.config.prompts.clone());
        let writer = BatchWriter::new(
            self.config.output.clone(),
            self.config.prompts.filename_suffix.clone(),
        );

        Ok(Companion {
            resolver: ResourceResolver::new(cache, client, gate),
            pipeline,
            writer,
            exclusions,
            collection: WorkingCollection::new(),
            config: self.config,
        })
    }
}
