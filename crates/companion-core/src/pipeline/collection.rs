//! The working set of decoded records.

use crate::models::{MetadataRecord, ResourceKind, ResourceRef};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const UNKNOWN_LABEL: &str = "Unknown";

/// Decoded records keyed by the image they came from, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct WorkingCollection {
    records: Vec<MetadataRecord>,
}

impl WorkingCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. A record from the same source path replaces the
    /// earlier one in place.
    pub fn insert(&mut self, record: MetadataRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.source_path == record.source_path)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn get(&self, source_path: &Path) -> Option<&MetadataRecord> {
        self.records.iter().find(|r| r.source_path == source_path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetadataRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, MetadataRecord> {
        self.records.iter_mut()
    }

    /// Keep only records matching `keep`. Returns how many were dropped.
    pub fn retain(&mut self, keep: impl FnMut(&MetadataRecord) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(keep);
        before - self.records.len()
    }

    /// Group records by model name (lowercased, trimmed), models ascending.
    /// Records keep their relative order within a model.
    pub fn order_by_model(&mut self) {
        self.records
            .sort_by_cached_key(|r| r.model.trim().to_lowercase());
    }

    /// Resolved resources of the given kinds, keyed by registry id.
    pub fn referenced_resources(&self, kinds: &[ResourceKind]) -> BTreeMap<String, ResourceRef> {
        self.records
            .iter()
            .flat_map(|r| r.resources.iter())
            .filter(|r| r.is_resolved() && !r.registry_id.is_empty() && kinds.contains(&r.kind))
            .map(|r| (r.registry_id.clone(), r.clone()))
            .collect()
    }

    /// Record count per base model, most common first.
    pub fn base_model_breakdown(&self) -> Vec<(String, usize)> {
        breakdown(self.records.iter().map(|r| r.base_model.as_str()))
    }

    /// Record count per model (with its base model when known), most common first.
    pub fn model_breakdown(&self) -> Vec<(String, usize)> {
        let labels: Vec<String> = self
            .records
            .iter()
            .map(|r| {
                let model = r.model.trim();
                if model.is_empty() || r.base_model.is_empty() {
                    model.to_string()
                } else {
                    format!("{} ({})", model, r.base_model)
                }
            })
            .collect();
        breakdown(labels.iter().map(String::as_str))
    }

    /// Record count per sampler, most common first.
    pub fn sampler_breakdown(&self) -> Vec<(String, usize)> {
        breakdown(self.records.iter().map(|r| r.sampler.as_str()))
    }
}

/// Count labels (blank = `Unknown`), sorted by count descending then label.
fn breakdown<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in labels {
        let label = label.trim();
        let label = if label.is_empty() { UNKNOWN_LABEL } else { label };
        *counts.entry(label.to_string()).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

impl FromIterator<MetadataRecord> for WorkingCollection {
    fn from_iter<I: IntoIterator<Item = MetadataRecord>>(iter: I) -> Self {
        let mut collection = WorkingCollection::new();
        for record in iter {
            collection.insert(record);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a WorkingCollection {
    type Item = &'a MetadataRecord;
    type IntoIter = std::slice::Iter<'a, MetadataRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
