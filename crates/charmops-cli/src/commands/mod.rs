//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and delegates to
//! `charmops-core`.

use charmops_core::{GitHubClient, GitHubConfig};

pub mod branches;
pub mod bundle_diff;
pub mod charm_paths;
pub mod contributing;
pub mod dispatch;
pub mod promote;
pub mod release;
pub mod scan;
pub mod tracks;

/// Render any displayable error as the CLI's error string.
pub(crate) fn fail<E: std::fmt::Display>(e: E) -> String {
    e.to_string()
}

/// Authenticated client for live runs; the token comes from `pat_env_var`.
pub(crate) fn github_client(pat_env_var: &str, api_url: Option<&str>) -> Result<GitHubClient, String> {
    let mut config = GitHubConfig::default().with_token_from_env(pat_env_var).map_err(fail)?;
    if let Some(url) = api_url {
        config = config.with_api_base_url(url);
    }
    GitHubClient::new(config).map_err(fail)
}
