//! GitHub Actions step outputs.
//!
//! Actions read step outputs from the file named by `$GITHUB_OUTPUT`, one
//! `name=value` per line.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::OpsError;

pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Sink for step outputs. Without a target file values are only logged.
#[derive(Debug, Clone, Default)]
pub struct GithubOutput {
    path: Option<PathBuf>,
}

impl GithubOutput {
    /// Use the file named by `$GITHUB_OUTPUT`, if set.
    pub fn from_env() -> Self {
        let path = std::env::var_os(GITHUB_OUTPUT_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self { path }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `name=value` to the output file.
    pub fn set(&self, name: &str, value: &str) -> Result<(), OpsError> {
        if value.contains('\n') {
            return Err(OpsError::Validation(format!(
                "Output '{}' must be a single line",
                name
            )));
        }

        let Some(path) = &self.path else {
            tracing::warn!(
                "[Output] {} is not set; not recording {}={}",
                GITHUB_OUTPUT_ENV,
                name,
                value
            );
            return Ok(());
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| OpsError::io(path, e))?;
        writeln!(file, "{}={}", name, value).map_err(|e| OpsError::io(path, e))?;
        tracing::debug!("[Output] {}={}", name, value);
        Ok(())
    }
}
