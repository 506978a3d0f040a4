//! Resource resolution: completes partial references via cache, then registry.
//!
//! # Algorithm
//! 1. A reference with a filename is left alone.
//! 2. Hash without id: hash cache, else remote hash lookup; the answer
//!    (including "not found") is cached.
//! 3. With an id: version cache, else remote id lookup; the answer
//!    (including "not found") is cached.
//!
//! Remote failures never propagate. A transport or parse failure is logged
//! and cached like a "not found", leaving the reference unresolved.

use crate::cache::{CachedVersion, ResourceCache};
use crate::models::{ResourceKind, ResourceRef};
use crate::network::{DynRateGate, DynRegistryClient, Lookup, RegistryVersion};
use tracing::{debug, info, warn};

impl From<RegistryVersion> for CachedVersion {
    fn from(version: RegistryVersion) -> Self {
        CachedVersion {
            filename: version.filename,
            display_name: version.display_name,
            base_model: version.base_model,
            kind: version.kind,
        }
    }
}

/// Completes [`ResourceRef`]s using a [`ResourceCache`] and a remote registry.
///
/// Holds the only handle to the cache, so cache appends are single-writer.
pub struct ResourceResolver {
    cache: ResourceCache,
    client: DynRegistryClient,
    gate: DynRateGate,
    remote_calls: usize,
}

impl ResourceResolver {
    pub fn new(cache: ResourceCache, client: DynRegistryClient, gate: DynRateGate) -> Self {
        Self {
            cache,
            client,
            gate,
            remote_calls: 0,
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Number of remote lookups issued so far.
    pub fn remote_calls(&self) -> usize {
        self.remote_calls
    }

    /// Registry id for a content hash, or `None` when unknown.
    pub async fn resolve_hash(&mut self, hash: &str) -> Option<String> {
        let hash = hash.trim();
        if hash.is_empty() {
            return None;
        }
        if let Some(id) = self.cache.hash_id(hash) {
            return (!id.is_empty()).then(|| id.to_string());
        }

        self.gate.wait().await;
        self.remote_calls += 1;
        let id = match self.client.lookup_by_hash(hash).await {
            Ok(Lookup::Found(id)) => Some(id),
            Ok(Lookup::NotFound) => {
                info!("Hash {} does not exist on the registry", hash);
                None
            }
            Err(e) if e.is_transport() => {
                warn!(
                    "Transport error looking up hash {}: {}; cached as not found until the cache files are removed",
                    hash, e
                );
                None
            }
            Err(e) => {
                warn!(
                    "Unreadable registry response for hash {}: {}; cached as not found until the cache files are removed",
                    hash, e
                );
                None
            }
        };
        self.cache.insert_hash(hash, id.as_deref().unwrap_or_default());
        id
    }

    /// Registry details for a version id, or `None` when unknown.
    pub async fn resolve_version(&mut self, id: &str) -> Option<CachedVersion> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        if let Some(version) = self.cache.version(id) {
            return version.is_found().then(|| version.clone());
        }

        self.gate.wait().await;
        self.remote_calls += 1;
        let version = match self.client.lookup_by_id(id).await {
            Ok(Lookup::Found(version)) => CachedVersion::from(version),
            Ok(Lookup::NotFound) => {
                info!("Model version id {} does not exist on the registry", id);
                CachedVersion::not_found()
            }
            Err(e) if e.is_transport() => {
                warn!(
                    "Transport error looking up model version id {}: {}; cached as not found until the cache files are removed",
                    id, e
                );
                CachedVersion::not_found()
            }
            Err(e) => {
                warn!(
                    "Unreadable registry response for model version id {}: {}; cached as not found until the cache files are removed",
                    id, e
                );
                CachedVersion::not_found()
            }
        };
        self.cache.insert_version(id, version);
        self.cache.version(id).filter(|v| v.is_found()).cloned()
    }

    /// Complete one reference in place. Idempotent.
    pub async fn resolve(&mut self, resource: &mut ResourceRef) {
        if resource.is_resolved() {
            return;
        }

        if resource.registry_id.is_empty() && !resource.content_hash.is_empty() {
            match self.resolve_hash(&resource.content_hash).await {
                Some(id) => resource.registry_id = id,
                None => {
                    debug!("Unable to look up version id for hash {}", resource.content_hash);
                    return;
                }
            }
        }

        if resource.registry_id.is_empty() {
            return;
        }
        match self.resolve_version(&resource.registry_id).await {
            Some(version) => {
                resource.filename = version.filename;
                resource.display_name = version.display_name;
                resource.base_model = version.base_model;
            }
            None => debug!(
                "Unable to look up filename for version id {}",
                resource.registry_id
            ),
        }
    }

    pub async fn resolve_all(&mut self, resources: &mut [ResourceRef]) {
        for resource in resources.iter_mut() {
            self.resolve(resource).await;
        }
    }

    /// Replace a decoded kind with the registry's kind when they disagree.
    ///
    /// Only consults the cache. Returns true when the kind changed.
    pub fn reconcile_kind(&self, resource: &mut ResourceRef) -> bool {
        let Some(remote) = self
            .cache
            .version(&resource.registry_id)
            .and_then(|v| ResourceKind::from_registry(&v.kind))
        else {
            return false;
        };
        if remote == resource.kind {
            return false;
        }
        warn!(
            "Resource type ({}) does not match registry type ({}) for {}; using registry type",
            resource.kind,
            remote,
            if resource.display_name.is_empty() {
                resource.registry_id.as_str()
            } else {
                resource.display_name.as_str()
            }
        );
        resource.kind = remote;
        true
    }
}
