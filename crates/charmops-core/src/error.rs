//! Core error type for charmops.
//!
//! `OpsError` covers the file- and manifest-level tooling. The dispatch
//! protocol has its own taxonomy in [`crate::dispatch::DispatchError`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    Http(String),

    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Unresolved placeholders remain in the generated file: {}", .0.join(", "))]
    Placeholders(Vec<String>),
}

impl OpsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OpsError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for OpsError {
    fn from(e: reqwest::Error) -> Self {
        OpsError::Http(e.to_string())
    }
}

/// Read a file to a string, attaching the path to any IO error.
pub(crate) fn read_to_string(path: impl AsRef<std::path::Path>) -> Result<String, OpsError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| OpsError::io(path, e))
}

/// Write a string to a file, attaching the path to any IO error.
pub fn write_string(path: impl AsRef<std::path::Path>, contents: &str) -> Result<(), OpsError> {
    let path = path.as_ref();
    std::fs::write(path, contents).map_err(|e| OpsError::io(path, e))
}
