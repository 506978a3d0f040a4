//! Error types for the companion library.
//!
//! Decoding, resolution and prompt normalization never surface these to the
//! caller; they degrade and log instead. Errors are only returned from
//! filesystem setup and output operations.

use crate::config::NetworkConfig;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the companion library.
#[derive(Debug, Error)]
pub enum CompanionError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Registry returned status {status} for {url}")]
    RegistryStatus { url: String, status: u16 },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for companion operations.
pub type Result<T> = std::result::Result<T, CompanionError>;

impl From<serde_json::Error> for CompanionError {
    fn from(err: serde_json::Error) -> Self {
        CompanionError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for CompanionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompanionError::Timeout(NetworkConfig::REQUEST_TIMEOUT)
        } else {
            CompanionError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| u.to_string()),
            }
        }
    }
}

impl CompanionError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CompanionError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for failures of the transport itself rather than a definite answer
    /// from the registry.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CompanionError::Network { .. }
                | CompanionError::Timeout(_)
                | CompanionError::RegistryStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompanionError::RegistryStatus {
            url: "https://civitai.com/api/v1/model-versions/1".into(),
            status: 500,
        };
        assert_eq!(
            err.to_string(),
            "Registry returned status 500 for https://civitai.com/api/v1/model-versions/1"
        );
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = CompanionError::io_with_path(io, "/tmp/cache.txt");
        match err {
            CompanionError::Io { path, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/cache.txt")))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_json_error_is_not_transport() {
        let err: CompanionError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, CompanionError::Json { source: Some(_), .. }));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_errors() {
        assert!(CompanionError::Timeout(std::time::Duration::from_secs(5)).is_transport());
        assert!(!CompanionError::Config {
            message: "bad".into()
        }
        .is_transport());
    }
}
