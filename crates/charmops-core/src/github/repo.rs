//! `owner/name` repository identifiers.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::OpsError;

/// A GitHub repository, identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

/// Parse a GitHub URL or `owner/repo` shorthand.
pub fn parse_repo_slug(input: &str) -> Option<RepoSlug> {
    let trimmed = input.trim();

    let patterns = [
        r"^https?://github\.com/([^/]+)/([^/\s#?]+?)(?:\.git)?/?$",
        r"^git@github\.com:([^/]+)/([^/\s#?]+?)(?:\.git)?$",
        r"^github\.com/([^/]+)/([^/\s#?]+?)(?:\.git)?/?$",
    ];

    for pattern in &patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(trimmed) {
                let owner = caps.get(1)?.as_str();
                let repo = caps.get(2)?.as_str();
                return Some(RepoSlug::new(owner, repo));
            }
        }
    }

    if let Ok(re) = Regex::new(r"^([a-zA-Z0-9\-_.]+)/([a-zA-Z0-9\-_.]+)$") {
        if let Some(caps) = re.captures(trimmed) {
            let owner = caps.get(1)?.as_str();
            let repo = caps.get(2)?.as_str();
            return Some(RepoSlug::new(owner, repo));
        }
    }

    None
}

impl FromStr for RepoSlug {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_repo_slug(s).ok_or_else(|| {
            OpsError::Config(format!(
                "Invalid repository '{}'. Expected owner/name or https://github.com/owner/name",
                s
            ))
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl Serialize for RepoSlug {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RepoSlug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let slug = parse_repo_slug("canonical/kubeflow-profiles-operator").unwrap();
        assert_eq!(slug.owner, "canonical");
        assert_eq!(slug.repo, "kubeflow-profiles-operator");
    }

    #[test]
    fn test_parse_urls() {
        for url in [
            "https://github.com/canonical/seldon-core-operator",
            "https://github.com/canonical/seldon-core-operator.git",
            "git@github.com:canonical/seldon-core-operator.git",
            "github.com/canonical/seldon-core-operator/",
        ] {
            let slug = parse_repo_slug(url).unwrap_or_else(|| panic!("failed to parse {url}"));
            assert_eq!(slug.to_string(), "canonical/seldon-core-operator");
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_repo_slug("just-a-name").is_none());
        assert!(parse_repo_slug("a/b/c").is_none());
        assert!("".parse::<RepoSlug>().is_err());
    }
}
