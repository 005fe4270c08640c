//! GitHub Actions REST client.
//!
//! POST {api}/repos/{owner}/{repo}/actions/workflows/{workflow}/dispatches
//! GET  {api}/repos/{owner}/{repo}/actions/workflows/{workflow}/runs
//! GET  {api}/repos/{owner}/{repo}/actions/runs/{run_id}
//! GET  {api}/repos/{owner}/{repo}/git/ref/heads/{branch}
//! POST {api}/repos/{owner}/{repo}/git/refs

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use super::repo::RepoSlug;
use crate::branches::{BranchApi, BranchCreation};
use crate::dispatch::{DispatchError, ExecutionRecord, WorkflowApi, WorkflowSpec};
use crate::error::OpsError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_API_VERSION: &str = "2022-11-28";
pub const DEFAULT_PAT_ENV: &str = "GITHUB_PAT";

/// Connection settings for the GitHub API.
#[derive(Clone)]
pub struct GitHubConfig {
    pub api_base_url: String,
    /// Bearer token; required for dispatching
    pub token: Option<String>,
    pub user_agent: String,
    pub api_version: String,
    /// Page size when listing workflow runs
    pub runs_per_page: u32,
    pub request_timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
            user_agent: format!("charmops/{}", env!("CARGO_PKG_VERSION")),
            api_version: DEFAULT_API_VERSION.to_string(),
            runs_per_page: 30,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base_url", &self.api_base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("api_version", &self.api_version)
            .field("runs_per_page", &self.runs_per_page)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GitHubConfig {
    /// Read the token from the environment variable `var`.
    pub fn with_token_from_env(mut self, var: &str) -> Result<Self, OpsError> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => {
                self.token = Some(token.trim().to_string());
                Ok(self)
            }
            _ => Err(OpsError::Config(format!(
                "Environment variable {} is not set. This must be set to a GitHub Personal \
                 Access Token with access to the target repositories.",
                var
            ))),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsPage {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    workflow_runs: Vec<ExecutionRecord>,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Calls the Actions and git refs APIs with a bearer token.
pub struct GitHubClient {
    client: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self, OpsError> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(&config)?)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OpsError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn repo_url(&self, repository: &RepoSlug) -> String {
        format!(
            "{}/repos/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            repository.owner,
            repository.repo
        )
    }

    fn workflow_url(&self, spec: &WorkflowSpec) -> String {
        format!(
            "{}/actions/workflows/{}",
            self.repo_url(&spec.repository),
            spec.workflow_name
        )
    }

    /// Send a request and return the status and body, logging both.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), reqwest::Error> {
        let request = request.build()?;
        tracing::debug!("[GitHub] {} {}", request.method(), request.url());

        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!("[GitHub] -> HTTP {}", status);
        tracing::trace!("[GitHub] body: {}", body);
        Ok((status, body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DispatchError> {
        let (status, body) = self.send(self.client.get(url)).await?;
        if !(200..300).contains(&status) {
            return Err(DispatchError::Api {
                status,
                message: error_message(&body),
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| DispatchError::Transport(format!("Failed to parse response from {}: {}", url, e)))
    }
}

/// Headers sent with every request: media type, API version, user agent and token.
fn default_headers(config: &GitHubConfig) -> Result<HeaderMap, OpsError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert(
        "x-github-api-version",
        HeaderValue::from_str(&config.api_version)
            .map_err(|e| OpsError::Config(format!("Invalid API version header: {}", e)))?,
    );
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent)
            .map_err(|e| OpsError::Config(format!("Invalid user agent: {}", e)))?,
    );
    if let Some(token) = &config.token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| OpsError::Config("GitHub token contains invalid characters".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Pull `message` out of a GitHub error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl WorkflowApi for GitHubClient {
    async fn dispatch(&self, spec: &WorkflowSpec, git_ref: &str) -> Result<(), DispatchError> {
        let url = format!("{}/dispatches", self.workflow_url(spec));
        let body = serde_json::json!({
            "ref": git_ref,
            "inputs": spec.inputs,
        });

        let (status, body) = self.send(self.client.post(&url).json(&body)).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(DispatchError::DispatchRejected {
                status,
                message: error_message(&body),
            })
        }
    }

    async fn list_runs(&self, spec: &WorkflowSpec) -> Result<Vec<ExecutionRecord>, DispatchError> {
        let url = format!(
            "{}/runs?per_page={}",
            self.workflow_url(spec),
            self.config.runs_per_page
        );
        let page: WorkflowRunsPage = self.get_json(&url).await?;
        tracing::debug!(
            "[GitHub] {} has {} run(s) in total, {} on this page",
            spec,
            page.total_count,
            page.workflow_runs.len()
        );
        Ok(page.workflow_runs)
    }

    async fn get_run(&self, repository: &RepoSlug, run_id: u64) -> Result<ExecutionRecord, DispatchError> {
        let url = format!("{}/actions/runs/{}", self.repo_url(repository), run_id);
        self.get_json(&url).await
    }
}

#[async_trait]
impl BranchApi for GitHubClient {
    async fn branch_head(&self, repository: &RepoSlug, branch: &str) -> Result<Option<String>, OpsError> {
        let url = format!("{}/git/ref/heads/{}", self.repo_url(repository), branch);
        let (status, body) = self.send(self.client.get(&url)).await?;
        match status {
            200 => {
                let git_ref: GitRef = serde_json::from_str(&body)?;
                Ok(Some(git_ref.object.sha))
            }
            404 | 409 => Ok(None),
            _ => Err(OpsError::Api {
                status,
                message: error_message(&body),
            }),
        }
    }

    async fn create_branch(&self, repository: &RepoSlug, branch: &str, sha: &str) -> Result<BranchCreation, OpsError> {
        let url = format!("{}/git/refs", self.repo_url(repository));
        let payload = serde_json::json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });
        let (status, body) = self.send(self.client.post(&url).json(&payload)).await?;
        match status {
            201 => Ok(BranchCreation::Created),
            422 => Ok(BranchCreation::AlreadyExists),
            _ => Err(OpsError::Api {
                status,
                message: format!("{} (check that the token can push to {})", error_message(&body), repository),
            }),
        }
    }
}
