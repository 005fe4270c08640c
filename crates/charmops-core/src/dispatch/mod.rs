//! Workflow dispatch: trigger GitHub Actions workflows and await their runs.
//!
//! # Architecture
//!
//! ```text
//! dispatch_manifest.yaml ──► DispatchManifest ──► run_manifest
//!                                                     │
//!                                                 Dispatcher ── poll loop
//!                                                     │
//!                                              WorkflowApi (trait)
//!                                                     │
//!                                       GitHubClient (REST) / test fakes
//! ```

pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod schema;

pub use dispatcher::{reference_time, select_recent_run, DispatchOptions, Dispatcher, WorkflowApi};
pub use driver::{plan_manifest, run_manifest, DispatchOutcome, ManifestReport};
pub use error::DispatchError;
pub use schema::{DispatchManifest, ExecutionRecord, RunConclusion, RunStatus, WorkflowSpec};
