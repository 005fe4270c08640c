//! charmops core: release-engineering logic for multi-charm bundles.
//!
//! This crate holds everything the `charmops` CLI does, without any CLI
//! dependency, so it can be driven from tests or other binaries:
//!
//! - `dispatch`: trigger GitHub Actions workflows and wait on the run each
//!   dispatch caused (the run id is not returned by the dispatch call)
//! - `github`: REST client, `owner/name` parsing and step outputs
//! - `bundle` / `release`: bundle parsing and diffing, release/promote manifests
//! - `promote`: `charmcraft promote` for each manifest entry
//! - `branches`: `track/<version>` branches for the charms a bundle pins
//! - `tracks`: bundle tracks missing on Charmhub
//! - `charm_paths`, `contributing`, `scan`: small CI helpers

pub mod branches;
pub mod bundle;
pub mod charm_paths;
pub mod contributing;
pub mod dispatch;
pub mod error;
pub mod github;
pub mod process;
pub mod promote;
pub mod release;
pub mod scan;
pub mod tracks;

// Convenience re-exports
pub use dispatch::{DispatchError, DispatchManifest, DispatchOptions, Dispatcher, WorkflowSpec};
pub use error::OpsError;
pub use github::{GitHubClient, GitHubConfig, GithubOutput};
