//! Types for workflow dispatch manifests and the runs they produce.
//!
//! A dispatch manifest is a YAML sequence of workflow dispatches:
//!
//! ```yaml
//! - repository: "canonical/kfp-operators"
//!   workflow_name: "release.yaml"
//!   inputs:
//!     origin-channel: "latest/edge"
//!     destination-channel: "2.0/stable"
//!     charm-name: "kfp-api"
//! - repository: "canonical/seldon-core-operator"
//!   workflow_name: "release.yaml"
//!   inputs:
//!     origin-channel: "latest/edge"
//!     destination-channel: "1.17/stable"
//! ```
//!
//! Entries are executed top to bottom, one at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{self, OpsError};
use crate::github::RepoSlug;

/// One workflow dispatch: which workflow, in which repository, with which inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Repository holding the workflow, as `owner/name`
    pub repository: RepoSlug,

    /// Workflow file name under `.github/workflows/` (or its numeric id)
    pub workflow_name: String,

    /// Named `workflow_dispatch` inputs
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
}

impl WorkflowSpec {
    pub fn new(repository: RepoSlug, workflow_name: impl Into<String>) -> Self {
        Self {
            repository,
            workflow_name: workflow_name.into(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for WorkflowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.workflow_name, self.repository)
    }
}

/// An ordered list of dispatches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchManifest {
    pub entries: Vec<WorkflowSpec>,
}

impl DispatchManifest {
    /// Parse a manifest from a YAML string. An empty document is an empty manifest.
    pub fn from_yaml(yaml: &str) -> Result<Self, OpsError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a manifest from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OpsError> {
        let content = error::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, OpsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the manifest as YAML.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), OpsError> {
        error::write_string(path, &self.to_yaml()?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lifecycle status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Requested,
    Queued,
    Pending,
    Waiting,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Requested => "requested",
            RunStatus::Queued => "queued",
            RunStatus::Pending => "pending",
            RunStatus::Waiting => "waiting",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
    StartupFailure,
    #[serde(other)]
    Unknown,
}

impl RunConclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            RunConclusion::Success => "success",
            RunConclusion::Failure => "failure",
            RunConclusion::Cancelled => "cancelled",
            RunConclusion::Skipped => "skipped",
            RunConclusion::TimedOut => "timed_out",
            RunConclusion::ActionRequired => "action_required",
            RunConclusion::Neutral => "neutral",
            RunConclusion::Stale => "stale",
            RunConclusion::StartupFailure => "startup_failure",
            RunConclusion::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one remote workflow run, as reported by the Actions API.
///
/// The run is owned by GitHub; this is a read-only copy refreshed by polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: u64,

    #[serde(default)]
    pub name: Option<String>,

    pub created_at: DateTime<Utc>,

    pub status: RunStatus,

    /// Only meaningful once `status` is `completed`
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,

    #[serde(default)]
    pub html_url: String,
}

impl ExecutionRecord {
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_success(&self) -> bool {
        self.is_completed() && self.conclusion == Some(RunConclusion::Success)
    }

    pub fn conclusion_label(&self) -> &'static str {
        self.conclusion.map(RunConclusion::as_str).unwrap_or("none")
    }
}

impl fmt::Display for ExecutionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {} ({}, created {}, status {}, conclusion {})",
            self.id,
            self.html_url,
            self.created_at.to_rfc3339(),
            self.status,
            self.conclusion_label()
        )
    }
}
