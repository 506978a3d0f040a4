//! Two-table resource lookup cache.
//!
//! - `hash -> registry id` (empty id = registry said "not found")
//! - `registry id -> (filename, display name, base model, kind)` (empty
//!   filename = not found)
//!
//! Both tables are loaded once and then only ever appended to. Every new
//! entry is written to its log as it is inserted; a failed write is logged
//! and the in-memory entry is kept for the rest of the run.

use super::log::{escape_field, AppendLog};
use crate::config::PathsConfig;
use crate::error::{CompanionError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Registry details cached for one version id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedVersion {
    pub filename: String,
    pub display_name: String,
    pub base_model: String,
    /// Registry-side kind, verbatim (e.g. `Checkpoint`, `LORA`).
    pub kind: String,
}

impl CachedVersion {
    /// The negative result cached for an id the registry does not know.
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        !self.filename.is_empty()
    }

    fn parse(line: &str) -> Option<(String, Self)> {
        let mut fields = line.splitn(5, ',');
        let id = fields.next()?.trim();
        if id.is_empty() {
            return None;
        }
        let mut next = || fields.next().unwrap_or_default().trim().to_string();
        let version = CachedVersion {
            filename: next(),
            display_name: next(),
            base_model: next(),
            kind: next(),
        };
        Some((id.to_string(), version))
    }
}

/// Persistent, append-only cache of registry lookups.
#[derive(Debug)]
pub struct ResourceCache {
    hashes: HashMap<String, String>,
    versions: HashMap<String, CachedVersion>,
    hash_log: AppendLog,
    version_log: AppendLog,
}

impl ResourceCache {
    /// Open (creating if needed) the cache files in `dir` and load them.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| CompanionError::io_with_path(e, dir))?;
        let mut cache = Self {
            hashes: HashMap::new(),
            versions: HashMap::new(),
            hash_log: AppendLog::open(dir.join(PathsConfig::HASH_CACHE_FILENAME)),
            version_log: AppendLog::open(dir.join(PathsConfig::VERSION_CACHE_FILENAME)),
        };
        cache.load()?;
        debug!(
            "Loaded resource cache from {}: {} hashes, {} versions",
            dir.display(),
            cache.hashes.len(),
            cache.versions.len()
        );
        Ok(cache)
    }

    /// A cache that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            hashes: HashMap::new(),
            versions: HashMap::new(),
            hash_log: AppendLog::memory(),
            version_log: AppendLog::memory(),
        }
    }

    fn load(&mut self) -> Result<()> {
        for line in self.hash_log.read_lines()? {
            let (hash, id) = line.split_once(',').unwrap_or((line.as_str(), ""));
            let hash = hash.trim();
            if !hash.is_empty() {
                self.hashes.insert(hash.to_string(), id.trim().to_string());
            }
        }
        for line in self.version_log.read_lines()? {
            if let Some((id, version)) = CachedVersion::parse(&line) {
                self.versions.insert(id, version);
            }
        }
        Ok(())
    }

    /// Cached registry id for a content hash.
    ///
    /// `Some("")` is a cached "not found".
    pub fn hash_id(&self, hash: &str) -> Option<&str> {
        self.hashes.get(hash).map(String::as_str)
    }

    pub fn version(&self, id: &str) -> Option<&CachedVersion> {
        self.versions.get(id)
    }

    /// Record a hash lookup result. Existing entries are never replaced.
    pub fn insert_hash(&mut self, hash: &str, id: &str) {
        if hash.is_empty() || self.hashes.contains_key(hash) {
            return;
        }
        self.hashes.insert(hash.to_string(), id.to_string());
        if let Err(e) = self.hash_log.append(&[hash, id]) {
            warn!("Failed to persist hash cache entry for {}: {}", hash, e);
        }
    }

    /// Record a version lookup result. Existing entries are never replaced.
    pub fn insert_version(&mut self, id: &str, version: CachedVersion) {
        if id.is_empty() || self.versions.contains_key(id) {
            return;
        }
        let fields = [
            id,
            version.filename.as_str(),
            version.display_name.as_str(),
            version.base_model.as_str(),
            version.kind.as_str(),
        ];
        if let Err(e) = self.version_log.append(&fields) {
            warn!("Failed to persist version cache entry for {}: {}", id, e);
        }
        self.versions.insert(id.to_string(), as_persisted(version));
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}

/// Keep the in-memory entry identical to what a reload would produce.
fn as_persisted(version: CachedVersion) -> CachedVersion {
    CachedVersion {
        filename: escape_field(&version.filename),
        display_name: escape_field(&version.display_name),
        base_model: escape_field(&version.base_model),
        kind: escape_field(&version.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> CachedVersion {
        CachedVersion {
            filename: "add_detail.safetensors".into(),
            display_name: "Detail Tweaker, LoRA".into(),
            base_model: "SD 1.5".into(),
            kind: "LORA".into(),
        }
    }

    #[test]
    fn test_round_trip_through_disk() {
        let temp = TempDir::new().unwrap();
        {
            let mut cache = ResourceCache::open(temp.path()).unwrap();
            cache.insert_hash("7c6bad76eb", "62833");
            cache.insert_hash("deadbeef", "");
            cache.insert_version("62833", sample());
            cache.insert_version("1", CachedVersion::not_found());
        }

        let cache = ResourceCache::open(temp.path()).unwrap();
        assert_eq!(cache.hash_id("7c6bad76eb"), Some("62833"));
        assert_eq!(cache.hash_id("deadbeef"), Some(""));
        assert_eq!(cache.hash_id("unknown"), None);

        let version = cache.version("62833").unwrap();
        assert_eq!(version.filename, "add_detail.safetensors");
        assert_eq!(version.display_name, "Detail Tweaker; LoRA");
        assert_eq!(version.kind, "LORA");
        assert!(!cache.version("1").unwrap().is_found());
    }

    #[test]
    fn test_entries_are_never_replaced() {
        let temp = TempDir::new().unwrap();
        let mut cache = ResourceCache::open(temp.path()).unwrap();
        cache.insert_hash("abc", "1");
        cache.insert_hash("abc", "2");
        assert_eq!(cache.hash_id("abc"), Some("1"));

        let contents =
            std::fs::read_to_string(temp.path().join(PathsConfig::HASH_CACHE_FILENAME)).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_in_memory_matches_reload() {
        let mut cache = ResourceCache::in_memory();
        cache.insert_version("5", sample());
        assert_eq!(cache.version("5").unwrap().display_name, "Detail Tweaker; LoRA");
        assert_eq!(cache.version_count(), 1);
    }

    #[test]
    fn test_parse_short_version_line() {
        let (id, version) = CachedVersion::parse("77,model.ckpt").unwrap();
        assert_eq!(id, "77");
        assert_eq!(version.filename, "model.ckpt");
        assert_eq!(version.kind, "");
        assert!(CachedVersion::parse(",x").is_none());
    }
}
