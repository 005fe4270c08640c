//! GitHub integration: repository identifiers, the Actions REST client and
//! step outputs.

pub mod client;
pub mod output;
pub mod repo;

pub use client::{GitHubClient, GitHubConfig, DEFAULT_API_BASE_URL, DEFAULT_PAT_ENV};
pub use output::GithubOutput;
pub use repo::{parse_repo_slug, RepoSlug};
