//! Local resource inventory and the download hand-off list.

use crate::error::{CompanionError, Result};
use crate::models::ResourceRef;
use crate::network::ExclusionList;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// File extensions counted as model resources.
const RESOURCE_EXTENSIONS: &[&str] = &["safetensors", "ckpt", "pt"];

/// Lowercased filenames of every resource file under `dir`, recursively.
pub fn scan_resources(dir: &Path) -> Result<HashSet<String>> {
    if !dir.is_dir() {
        return Err(CompanionError::FileNotFound(dir.to_path_buf()));
    }

    let mut found = HashSet::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_resource = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| RESOURCE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_resource {
            found.insert(entry.file_name().to_string_lossy().to_lowercase());
        }
    }

    debug!("Found {} local resource file(s) in {}", found.len(), dir.display());
    Ok(found)
}

/// Referenced resources that are neither present locally nor excluded.
///
/// Filenames are compared case-insensitively; `local` holds lowercased
/// names as produced by [`scan_resources`].
pub fn missing_resources(
    referenced: &BTreeMap<String, ResourceRef>,
    local: &HashSet<String>,
    exclusions: &ExclusionList,
) -> Vec<ResourceRef> {
    let mut excluded = 0;
    let missing: Vec<ResourceRef> = referenced
        .values()
        .filter(|r| !local.contains(&r.filename.to_lowercase()))
        .filter(|r| {
            let keep = !exclusions.contains(&r.registry_id);
            if !keep {
                excluded += 1;
            }
            keep
        })
        .cloned()
        .collect();

    info!(
        "{} referenced resource(s) missing locally ({} excluded)",
        missing.len(),
        excluded
    );
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;
    use std::fs;
    use tempfile::TempDir;

    fn resolved(id: &str, filename: &str) -> ResourceRef {
        let mut r = ResourceRef::with_id(ResourceKind::Lora, id);
        r.filename = filename.into();
        r
    }

    #[test]
    fn test_scan_resources() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("lora/sub")).unwrap();
        fs::write(temp.path().join("model.SafeTensors"), b"").unwrap();
        fs::write(temp.path().join("lora/sub/detail.pt"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();

        let found = scan_resources(temp.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains("model.safetensors"));
        assert!(found.contains("detail.pt"));
    }

    #[test]
    fn test_scan_missing_dir() {
        let result = scan_resources(Path::new("/nonexistent/resources"));
        assert!(matches!(result, Err(CompanionError::FileNotFound(_))));
    }

    #[test]
    fn test_missing_resources() {
        let referenced: BTreeMap<String, ResourceRef> = [
            resolved("1", "Have.safetensors"),
            resolved("2", "need.safetensors"),
            resolved("3", "skip.safetensors"),
        ]
        .into_iter()
        .map(|r| (r.registry_id.clone(), r))
        .collect();
        let local: HashSet<String> = ["have.safetensors".to_string()].into_iter().collect();
        let exclusions = ExclusionList::parse("3\n");

        let missing = missing_resources(&referenced, &local, &exclusions);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].registry_id, "2");
    }
}
