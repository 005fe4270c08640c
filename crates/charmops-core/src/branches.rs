//! `track/<version>` branches for the charms a release bundle pins.
//!
//! Every team-managed application on a non-`latest` channel gets a branch
//! named after its track, cut from the head of the repository's main branch.

use async_trait::async_trait;

use crate::bundle::Bundle;
use crate::error::OpsError;
use crate::github::RepoSlug;

pub const TRACK_BRANCH_PREFIX: &str = "track/";

/// Branches tried, in order, when looking for the commit to branch from.
pub const MAIN_BRANCH_NAMES: [&str; 2] = ["main", "master"];

/// One branch to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackBranch {
    pub charm: String,
    pub repository: RepoSlug,
    /// Channel track, e.g. `1.8` for `1.8/stable`
    pub track: String,
}

impl TrackBranch {
    pub fn branch_name(&self) -> String {
        format!("{}{}", TRACK_BRANCH_PREFIX, self.track)
    }
}

/// The branches a bundle calls for, one per charm, in bundle order.
///
/// Applications on a `latest` channel, without `_github_repo_name` or
/// without a channel are skipped. A charm listed twice keeps its first
/// position and its last track.
pub fn track_branches(bundle: &Bundle) -> Vec<TrackBranch> {
    let mut branches: Vec<TrackBranch> = Vec::new();

    for (name, app) in &bundle.applications {
        let Some(channel) = app.channel.as_deref() else {
            tracing::warn!("[Branches] Application {} has no channel, skipping", name);
            continue;
        };
        let Some(repo_name) = app.github_repo_name.as_deref() else {
            tracing::debug!("[Branches] {} has no _github_repo_name, skipping", name);
            continue;
        };
        if channel.contains("latest") {
            tracing::debug!("[Branches] {} tracks {}, skipping", name, channel);
            continue;
        }

        let track = channel.split('/').next().unwrap_or(channel).to_string();
        let branch = TrackBranch {
            charm: app.charm.clone(),
            repository: RepoSlug::new(app.repo_owner(), repo_name),
            track,
        };
        match branches.iter_mut().find(|b| b.charm == branch.charm) {
            Some(existing) => *existing = branch,
            None => branches.push(branch),
        }
    }

    branches
}

/// Result of asking for a branch that may already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCreation {
    Created,
    AlreadyExists,
}

/// Git refs operations on the remote.
#[async_trait]
pub trait BranchApi: Send + Sync {
    /// Head commit of `branch`, or `None` if there is no such branch.
    async fn branch_head(&self, repository: &RepoSlug, branch: &str) -> Result<Option<String>, OpsError>;

    /// Create `branch` pointing at `sha`.
    async fn create_branch(&self, repository: &RepoSlug, branch: &str, sha: &str) -> Result<BranchCreation, OpsError>;
}

/// Head commit of the first of [`MAIN_BRANCH_NAMES`] that exists.
pub async fn latest_commit_sha<A: BranchApi>(api: &A, repository: &RepoSlug) -> Result<Option<String>, OpsError> {
    for branch in MAIN_BRANCH_NAMES {
        if let Some(sha) = api.branch_head(repository, branch).await? {
            tracing::info!("[Branches] Latest commit of {} on {} is {}", repository, branch, sha);
            return Ok(Some(sha));
        }
    }
    Ok(None)
}

/// Create one track branch from the repository's main branch.
pub async fn create_track_branch<A: BranchApi>(api: &A, branch: &TrackBranch) -> Result<BranchCreation, OpsError> {
    let name = branch.branch_name();
    let sha = latest_commit_sha(api, &branch.repository).await?.ok_or_else(|| {
        OpsError::Validation(format!(
            "No {} branch found in {}; {} was not created. Check the repository name.",
            MAIN_BRANCH_NAMES.join(" or "),
            branch.repository,
            name
        ))
    })?;
    api.create_branch(&branch.repository, &name, &sha).await
}

#[derive(Debug)]
pub struct BranchOutcome {
    pub branch: TrackBranch,
    pub result: Result<BranchCreation, OpsError>,
}

#[derive(Debug, Default)]
pub struct BranchReport {
    pub outcomes: Vec<BranchOutcome>,
}

impl BranchReport {
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// What a live run would create.
pub fn plan_branches(branches: &[TrackBranch]) -> Vec<String> {
    branches
        .iter()
        .map(|b| {
            format!(
                "Dry run: would create branch {} for charm {} in {}",
                b.branch_name(),
                b.charm,
                b.repository
            )
        })
        .collect()
}

/// Create every branch in turn; a failure is logged and the rest still run.
pub async fn create_track_branches<A: BranchApi>(api: &A, branches: &[TrackBranch]) -> BranchReport {
    let mut report = BranchReport::default();

    for branch in branches {
        tracing::info!(
            "[Branches] Creating {} for charm {} in {}",
            branch.branch_name(),
            branch.charm,
            branch.repository
        );
        let result = create_track_branch(api, branch).await;
        match &result {
            Ok(BranchCreation::Created) => {
                tracing::info!("[Branches] {} created in {}", branch.branch_name(), branch.repository)
            }
            Ok(BranchCreation::AlreadyExists) => {
                tracing::info!("[Branches] {} already exists in {}", branch.branch_name(), branch.repository)
            }
            Err(err) => tracing::error!(
                "[Branches] Failed to create {} in {}: {}",
                branch.branch_name(),
                branch.repository,
                err
            ),
        }
        report.outcomes.push(BranchOutcome {
            branch: branch.clone(),
            result,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const BUNDLE: &str = r#"
applications:
  admission-webhook:
    charm: admission-webhook
    channel: 1.8/stable
    _github_repo_name: admission-webhook-operator
  kfp-api:
    charm: kfp-api
    channel: 2.0/stable
    _github_repo_name: kfp-operators
    _github_repo_owner: someone-else
  kfp-ui:
    charm: kfp-ui
    channel: latest/edge
    _github_repo_name: kfp-operators
  mysql:
    charm: mysql-k8s
    channel: 8.0/stable
  floating:
    charm: floating
    _github_repo_name: floating-operator
"#;

    #[test]
    fn test_track_branches_trims_bundle() {
        let bundle = Bundle::from_yaml(BUNDLE).unwrap();
        let branches = track_branches(&bundle);

        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].charm, "admission-webhook");
        assert_eq!(branches[0].branch_name(), "track/1.8");
        assert_eq!(branches[0].repository.to_string(), "canonical/admission-webhook-operator");
        assert_eq!(branches[1].repository.to_string(), "someone-else/kfp-operators");
        assert_eq!(branches[1].track, "2.0");
    }

    #[test]
    fn test_repeated_charm_keeps_last_track() {
        let yaml = r#"
applications:
  a:
    charm: shared
    channel: 1.7/stable
    _github_repo_name: shared-operator
  b:
    charm: other
    channel: 1.0/stable
    _github_repo_name: other-operator
  c:
    charm: shared
    channel: 1.8/stable
    _github_repo_name: shared-operator
"#;
        let branches = track_branches(&Bundle::from_yaml(yaml).unwrap());
        let pairs: Vec<(&str, &str)> = branches.iter().map(|b| (b.charm.as_str(), b.track.as_str())).collect();
        assert_eq!(pairs, [("shared", "1.8"), ("other", "1.0")]);
    }

    /// Heads per `owner/name@branch`; existing branches per `owner/name@branch`.
    #[derive(Default)]
    struct FakeRefs {
        heads: HashMap<String, String>,
        existing: Vec<String>,
        forbidden: Vec<String>,
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BranchApi for FakeRefs {
        async fn branch_head(&self, repository: &RepoSlug, branch: &str) -> Result<Option<String>, OpsError> {
            Ok(self.heads.get(&format!("{}@{}", repository, branch)).cloned())
        }

        async fn create_branch(&self, repository: &RepoSlug, branch: &str, sha: &str) -> Result<BranchCreation, OpsError> {
            let key = format!("{}@{}", repository, branch);
            if self.forbidden.contains(&repository.to_string()) {
                return Err(OpsError::Api {
                    status: 403,
                    message: "Resource not accessible by integration".to_string(),
                });
            }
            if self.existing.contains(&key) {
                return Ok(BranchCreation::AlreadyExists);
            }
            self.created.lock().unwrap().push(format!("{}={}", key, sha));
            Ok(BranchCreation::Created)
        }
    }

    fn branch(repo: &str, track: &str) -> TrackBranch {
        TrackBranch {
            charm: repo.to_string(),
            repository: repo.parse().unwrap(),
            track: track.to_string(),
        }
    }

    #[tokio::test]
    async fn test_latest_commit_falls_back_to_master() {
        let api = FakeRefs {
            heads: HashMap::from([("canonical/old@master".to_string(), "abc123".to_string())]),
            ..Default::default()
        };
        let sha = latest_commit_sha(&api, &"canonical/old".parse().unwrap()).await.unwrap();
        assert_eq!(sha.as_deref(), Some("abc123"));
        assert!(latest_commit_sha(&api, &"canonical/none".parse().unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_track_branches_continues_after_failure() {
        let api = FakeRefs {
            heads: HashMap::from([
                ("canonical/a@main".to_string(), "sha-a".to_string()),
                ("canonical/b@main".to_string(), "sha-b".to_string()),
                ("canonical/c@main".to_string(), "sha-c".to_string()),
            ]),
            existing: vec!["canonical/b@track/1.8".to_string()],
            forbidden: vec!["canonical/c".to_string()],
            ..Default::default()
        };
        let branches = vec![
            branch("canonical/missing", "1.8"),
            branch("canonical/a", "1.8"),
            branch("canonical/b", "1.8"),
            branch("canonical/c", "1.8"),
        ];

        let report = create_track_branches(&api, &branches).await;
        assert!(!report.success());
        assert_eq!(report.outcomes.len(), 4);
        assert!(matches!(report.outcomes[0].result, Err(OpsError::Validation(_))));
        assert!(matches!(report.outcomes[1].result, Ok(BranchCreation::Created)));
        assert!(matches!(report.outcomes[2].result, Ok(BranchCreation::AlreadyExists)));
        assert!(matches!(report.outcomes[3].result, Err(OpsError::Api { status: 403, .. })));
        assert_eq!(report.failures().count(), 2);
        assert_eq!(
            api.created.lock().unwrap().as_slice(),
            ["canonical/a@track/1.8=sha-a".to_string()]
        );
    }

    #[test]
    fn test_plan_branches() {
        let lines = plan_branches(&[branch("canonical/a", "2.0")]);
        assert_eq!(lines, ["Dry run: would create branch track/2.0 for charm canonical/a in canonical/a"]);
    }
}
