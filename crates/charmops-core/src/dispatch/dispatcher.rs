//! Dispatch a workflow and wait on the run it caused.
//!
//! `workflow_dispatch` returns no run id, so the run is found by listing the
//! workflow's runs and keeping the ones created after a timestamp taken just
//! before the dispatch call. The run list is not read-your-writes consistent,
//! so the run may take a few polls to show up:
//!
//! ```text
//!   SEARCHING ──resolve ok──► TRACKING ──status completed──► TERMINAL
//!     │  ▲                      │  ▲                          │
//!     └──┘ NoRunFound           └──┘ still running            ├─ success  → Ok(run)
//!                                                             └─ otherwise → RunFailed
//!   timeout in SEARCHING → RunTimeout { run: None }
//!   timeout in TRACKING  → RunTimeout { run: Some(last seen) }
//!   AmbiguousRuns        → returned as-is, never guessed
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::time::Instant;

use super::error::DispatchError;
use super::schema::{ExecutionRecord, WorkflowSpec};
use crate::github::RepoSlug;

pub const DEFAULT_REF: &str = "main";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The three remote operations the protocol needs.
///
/// None of them is expected to return a run id at dispatch time.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Trigger `spec.workflow_name` on `git_ref` with `spec.inputs`.
    async fn dispatch(&self, spec: &WorkflowSpec, git_ref: &str) -> Result<(), DispatchError>;

    /// List the runs of the workflow named by `spec`, newest first.
    async fn list_runs(&self, spec: &WorkflowSpec) -> Result<Vec<ExecutionRecord>, DispatchError>;

    /// Re-fetch a single run.
    async fn get_run(&self, repository: &RepoSlug, run_id: u64) -> Result<ExecutionRecord, DispatchError>;
}

/// Per-dispatch settings.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Branch or tag the workflow runs on
    pub git_ref: String,
    /// Upper bound on the time spent looking for and waiting on the run
    pub timeout: Duration,
    /// Pause between polls
    pub poll_interval: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            git_ref: DEFAULT_REF.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

enum PollState {
    Searching,
    Tracking(ExecutionRecord),
}

/// The reference timestamp for a dispatch issued at `now`.
///
/// GitHub reports `created_at` in whole seconds, so the reference is the last
/// instant of the previous second: a run created in the same second as the
/// dispatch still compares newer. A second run started in that same second
/// shows up as `AmbiguousRuns`.
pub fn reference_time(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(0) - chrono::Duration::nanoseconds(1)
}

/// Pick the single run created strictly after `since`.
pub fn select_recent_run(
    runs: Vec<ExecutionRecord>,
    since: DateTime<Utc>,
) -> Result<ExecutionRecord, DispatchError> {
    let mut recent: Vec<ExecutionRecord> = runs.into_iter().filter(|r| r.created_at > since).collect();
    match recent.len() {
        0 => Err(DispatchError::NoRunFound),
        1 => Ok(recent.remove(0)),
        _ => Err(DispatchError::AmbiguousRuns { runs: recent }),
    }
}

/// Dispatches workflows through a [`WorkflowApi`] and waits on their runs.
pub struct Dispatcher<A> {
    api: A,
    options: DispatchOptions,
}

impl<A: WorkflowApi> Dispatcher<A> {
    pub fn new(api: A) -> Self {
        Self::with_options(api, DispatchOptions::default())
    }

    pub fn with_options(api: A, options: DispatchOptions) -> Self {
        Self { api, options }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Dispatch with the configured timeout and poll interval.
    pub async fn run(&self, spec: &WorkflowSpec) -> Result<ExecutionRecord, DispatchError> {
        self.dispatch_and_await(spec, self.options.timeout, self.options.poll_interval)
            .await
    }

    /// Trigger the workflow and wait until its run succeeds, fails or times out.
    pub async fn dispatch_and_await(
        &self,
        spec: &WorkflowSpec,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ExecutionRecord, DispatchError> {
        // Taken in UTC before the call so that runs created by this dispatch
        // always compare newer than it.
        let since = reference_time(Utc::now());

        tracing::info!(
            "[Dispatch] Dispatching {} on ref '{}' with inputs {:?}",
            spec,
            self.options.git_ref,
            spec.inputs
        );
        self.api.dispatch(spec, &self.options.git_ref).await?;

        self.poll_until_terminal(spec, since, timeout, poll_interval).await
    }

    /// Find the one run of the workflow created after `since`.
    pub async fn resolve_recent_run(
        &self,
        spec: &WorkflowSpec,
        since: DateTime<Utc>,
    ) -> Result<ExecutionRecord, DispatchError> {
        let runs = self.api.list_runs(spec).await?;
        tracing::debug!("[Dispatch] {} lists {} run(s)", spec, runs.len());
        select_recent_run(runs, since)
    }

    /// Wait for the run created after `since` to reach `completed`.
    pub async fn poll_until_terminal(
        &self,
        spec: &WorkflowSpec,
        since: DateTime<Utc>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ExecutionRecord, DispatchError> {
        let started = Instant::now();
        let mut state = PollState::Searching;

        tracing::info!("[Dispatch] Looking for the run of {} created after {}", spec, since.to_rfc3339());

        while started.elapsed() < timeout {
            let run = match std::mem::replace(&mut state, PollState::Searching) {
                PollState::Searching => match self.resolve_recent_run(spec, since).await {
                    Ok(run) => {
                        tracing::info!("[Dispatch] Found workflow run {}", run.html_url);
                        run
                    }
                    Err(DispatchError::NoRunFound) => {
                        tracing::info!(
                            "[Dispatch] No runs found yet. Sleeping {:?} and retrying",
                            poll_interval
                        );
                        tokio::time::sleep(poll_interval).await;
                        continue;
                    }
                    Err(err @ DispatchError::AmbiguousRuns { .. }) => {
                        if let DispatchError::AmbiguousRuns { runs } = &err {
                            let urls: Vec<&str> = runs.iter().map(|r| r.html_url.as_str()).collect();
                            tracing::error!(
                                "[Dispatch] Found more than one run of {} since {}: {:?}",
                                spec,
                                since.to_rfc3339(),
                                urls
                            );
                        }
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                },
                PollState::Tracking(run) => {
                    tracing::debug!("[Dispatch] Refreshing run {}", run.id);
                    self.api.get_run(&spec.repository, run.id).await?
                }
            };

            tracing::info!("[Dispatch] Run {} status is '{}'", run.id, run.status);
            if run.is_completed() {
                return if run.is_success() {
                    tracing::info!("[Dispatch] Run {} succeeded", run.id);
                    Ok(run)
                } else {
                    Err(DispatchError::RunFailed { run: Box::new(run) })
                };
            }

            state = PollState::Tracking(run);
            tokio::time::sleep(poll_interval).await;
        }

        let err = match state {
            PollState::Searching => DispatchError::RunTimeout { run: None },
            PollState::Tracking(run) => DispatchError::RunTimeout {
                run: Some(Box::new(run)),
            },
        };
        tracing::error!("[Dispatch] {}: {}", spec, err);
        Err(err)
    }
}
