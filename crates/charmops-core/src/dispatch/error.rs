//! Failure taxonomy for the dispatch-and-wait protocol.

use super::schema::ExecutionRecord;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The dispatch call itself was refused (wrong workflow id, unknown
    /// inputs, missing permissions). Not retried.
    #[error(
        "Workflow dispatch was rejected (HTTP {status}): {message}. Check the workflow name \
         and inputs; rerun with --github-debug-logging for the full response"
    )]
    DispatchRejected { status: u16, message: String },

    /// No run newer than the reference timestamp is visible yet.
    #[error("No runs found since the dispatch time")]
    NoRunFound,

    /// More than one run appeared after the reference timestamp.
    #[error("Found {} runs since the dispatch time; cannot tell which one was ours", .runs.len())]
    AmbiguousRuns { runs: Vec<ExecutionRecord> },

    /// The run completed without succeeding.
    #[error("Workflow run {} finished with conclusion '{}' ({})", .run.id, .run.conclusion_label(), .run.html_url)]
    RunFailed { run: Box<ExecutionRecord> },

    /// The wait budget ran out. Carries the run if one was ever found.
    #[error("{}", timeout_message(.run.as_deref()))]
    RunTimeout { run: Option<Box<ExecutionRecord>> },

    /// A read call (listing or refreshing runs) got a non-success response.
    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("GitHub request failed: {0}")]
    Transport(String),
}

fn timeout_message(run: Option<&ExecutionRecord>) -> String {
    match run {
        Some(run) => format!(
            "Timed out waiting for workflow run {} to complete (last status '{}', {})",
            run.id, run.status, run.html_url
        ),
        None => "Timed out without finding a recent run for the workflow".to_string(),
    }
}

impl DispatchError {
    /// Whether the poll loop may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::NoRunFound)
    }

    /// The run carried by this error, if any.
    pub fn run(&self) -> Option<&ExecutionRecord> {
        match self {
            DispatchError::RunFailed { run } => Some(run.as_ref()),
            DispatchError::RunTimeout { run } => run.as_deref(),
            _ => None,
        }
    }

    /// Short, stable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::DispatchRejected { .. } => "dispatch_rejected",
            DispatchError::NoRunFound => "no_run_found",
            DispatchError::AmbiguousRuns { .. } => "ambiguous_runs",
            DispatchError::RunFailed { .. } => "run_failed",
            DispatchError::RunTimeout { .. } => "run_timeout",
            DispatchError::Api { .. } => "api_error",
            DispatchError::Transport(_) => "transport_error",
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        DispatchError::Transport(e.to_string())
    }
}
