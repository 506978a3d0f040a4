//! Remote registry abstraction.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Details the registry reports for one resource version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryVersion {
    /// Filesystem-safe filename of the version's primary file.
    pub filename: String,
    pub display_name: String,
    pub base_model: String,
    /// Registry-side type, verbatim.
    pub kind: String,
}

/// A definite answer from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

/// Lookups against a remote resource registry.
///
/// `Ok(Lookup::NotFound)` is a definite negative answer; `Err` is a
/// transport or parse failure.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Map a content hash to a registry version id.
    async fn lookup_by_hash(&self, hash: &str) -> Result<Lookup<String>>;

    /// Fetch the details of a registry version id.
    async fn lookup_by_id(&self, id: &str) -> Result<Lookup<RegistryVersion>>;
}

pub type DynRegistryClient = Arc<dyn RegistryClient>;
