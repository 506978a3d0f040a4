//! User-maintained list of registry ids that must never be downloaded.

use crate::error::{CompanionError, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Registry version ids excluded from downloading.
///
/// Excluded ids are still resolved for their metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    ids: HashSet<String>,
}

impl ExclusionList {
    /// Load one id per line. `#` comments, blank lines and non-integer
    /// entries are ignored; a missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| CompanionError::io_with_path(e, path))?;
        let list = Self::parse(&contents);
        debug!(
            "Cached {} resource ids that will not be downloaded",
            list.ids.len()
        );
        Ok(list)
    }

    pub fn parse(contents: &str) -> Self {
        let ids = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter(|line| line.parse::<u64>().is_ok())
            .map(str::to_string)
            .collect();
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id.trim())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<String> for ExclusionList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_ignores_noise() {
        let list = ExclusionList::parse("# huge checkpoints\n12345\n\n  678 \nnot-an-id\n");
        assert_eq!(list.len(), 2);
        assert!(list.contains("12345"));
        assert!(list.contains("678"));
        assert!(!list.contains("not-an-id"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let list = ExclusionList::load(&temp.path().join("do_not_download.txt")).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("do_not_download.txt");
        std::fs::write(&path, "42\n").unwrap();
        assert!(ExclusionList::load(&path).unwrap().contains("42"));
    }
}
