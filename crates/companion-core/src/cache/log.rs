//! Append-only flat-text log backing one cache table.
//!
//! One record per line, fields joined by `,`. Commas inside a field are
//! escaped to `;` before writing, so a line always splits back into the
//! same number of fields.

use crate::error::{CompanionError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Escape a field for the comma-separated line format.
pub fn escape_field(field: &str) -> String {
    field.replace(['\n', '\r'], " ").replace(',', ";")
}

/// A log file, or nothing at all for a purely in-memory cache.
#[derive(Debug, Clone)]
pub struct AppendLog {
    path: Option<PathBuf>,
}

impl AppendLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read every non-empty line. A log that does not exist yet is empty.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(path).map_err(|e| CompanionError::io_with_path(e, path))?;
        Ok(contents
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Append one record built from `fields`.
    pub fn append(&self, fields: &[&str]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let line = fields
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CompanionError::io_with_path(e, path))?;
        writeln!(file, "{}", line).map_err(|e| CompanionError::io_with_path(e, path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read() {
        let temp = TempDir::new().unwrap();
        let log = AppendLog::open(temp.path().join("ids.txt"));
        assert!(log.read_lines().unwrap().is_empty());

        log.append(&["123", "name, with comma.safetensors"]).unwrap();
        log.append(&["456", ""]).unwrap();

        let lines = log.read_lines().unwrap();
        assert_eq!(lines, vec!["123,name; with comma.safetensors", "456,"]);
    }

    #[test]
    fn test_memory_log_is_noop() {
        let log = AppendLog::memory();
        log.append(&["a", "b"]).unwrap();
        assert!(log.read_lines().unwrap().is_empty());
        assert!(log.path().is_none());
    }
}
