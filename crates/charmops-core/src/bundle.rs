//! Juju bundle files.
//!
//! Only the `applications` section matters here. Applications managed by the
//! team carry extra underscore-prefixed keys that Juju ignores:
//!
//! ```yaml
//! applications:
//!   kfp-api:
//!     charm: kfp-api
//!     channel: 2.0/stable
//!     scale: 1
//!     _github_repo_name: kfp-operators
//!     _path_in_github_repo: charms/kfp-api
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{self, OpsError};

/// Owner assumed when `_github_repo_owner` is absent.
pub const DEFAULT_REPO_OWNER: &str = "canonical";

/// One application entry of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub charm: String,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default, rename = "_github_repo_name")]
    pub github_repo_name: Option<String>,

    #[serde(default, rename = "_github_repo_owner")]
    pub github_repo_owner: Option<String>,

    /// Charm location inside the repository, e.g. `charms/kfp-api`
    #[serde(default, rename = "_path_in_github_repo")]
    pub path_in_github_repo: Option<String>,

    /// Set on charms the team depends on but does not release
    #[serde(default, rename = "_github_dependency_repo_name")]
    pub github_dependency_repo_name: Option<String>,

    /// Everything else (scale, trust, options, resources, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Application {
    pub fn repo_owner(&self) -> &str {
        self.github_repo_owner.as_deref().unwrap_or(DEFAULT_REPO_OWNER)
    }

    pub fn repo_path(&self) -> &str {
        self.path_in_github_repo.as_deref().unwrap_or("./")
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawBundle {
    #[serde(default)]
    applications: serde_yaml::Mapping,
}

/// A parsed bundle, keeping applications in file order.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub applications: Vec<(String, Application)>,
    /// The whole file as loaded, for structural comparison
    pub document: serde_yaml::Value,
}

impl Bundle {
    pub fn from_yaml(yaml: &str) -> Result<Self, OpsError> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let raw: RawBundle = match document {
            serde_yaml::Value::Null => RawBundle::default(),
            _ => serde_yaml::from_value(document.clone())?,
        };
        let mut applications = Vec::with_capacity(raw.applications.len());
        for (key, value) in raw.applications {
            let name = key
                .as_str()
                .ok_or_else(|| OpsError::Validation(format!("Application name {:?} is not a string", key)))?
                .to_string();
            let app: Application = serde_yaml::from_value(value).map_err(|e| {
                OpsError::Validation(format!("Invalid application '{}': {}", name, e))
            })?;
            applications.push((name, app));
        }
        Ok(Self { applications, document })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OpsError> {
        let content = error::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn application(&self, name: &str) -> Option<&Application> {
        self.applications
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, app)| app)
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Everything that differs between this bundle and `other`.
    ///
    /// Mapping key order and sequence order are ignored: a reordered list
    /// is not a change, an element present in only one side is.
    pub fn diff(&self, other: &Bundle) -> Vec<BundleChange> {
        let mut changes = Vec::new();
        diff_values(String::new(), &self.document, &other.document, &mut changes);
        changes
    }

    pub fn same_content(&self, other: &Bundle) -> bool {
        same(&self.document, &other.document)
    }
}

/// One difference found by [`Bundle::diff`]. Paths look like
/// `applications.kfp-api.channel` or `applications.kfp-api.constraints[1]`.
#[derive(Debug, Clone, PartialEq)]
pub enum BundleChange {
    Added { path: String, value: serde_yaml::Value },
    Removed { path: String, value: serde_yaml::Value },
    Changed {
        path: String,
        old: serde_yaml::Value,
        new: serde_yaml::Value,
    },
}

impl BundleChange {
    pub fn path(&self) -> &str {
        match self {
            BundleChange::Added { path, .. } | BundleChange::Removed { path, .. } | BundleChange::Changed { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for BundleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path().is_empty() { "(root)" } else { self.path() };
        match self {
            BundleChange::Added { value, .. } => write!(f, "+ {}: {}", path, inline(value)),
            BundleChange::Removed { value, .. } => write!(f, "- {}: {}", path, inline(value)),
            BundleChange::Changed { old, new, .. } => {
                write!(f, "~ {}: {} -> {}", path, inline(old), inline(new))
            }
        }
    }
}

fn inline(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{:?}", other)),
    }
}

fn key_label(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => inline(other),
    }
}

fn child_path(parent: &str, key: &serde_yaml::Value) -> String {
    if parent.is_empty() {
        key_label(key)
    } else {
        format!("{}.{}", parent, key_label(key))
    }
}

/// Equality that ignores sequence order, recursively.
fn same(a: &serde_yaml::Value, b: &serde_yaml::Value) -> bool {
    use serde_yaml::Value;
    match (a, b) {
        (Value::Mapping(a), Value::Mapping(b)) => {
            a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| same(v, w)))
        }
        (Value::Sequence(a), Value::Sequence(b)) => a.len() == b.len() && unmatched(a, b).0.is_empty(),
        (Value::Tagged(a), Value::Tagged(b)) => a.tag == b.tag && same(&a.value, &b.value),
        _ => a == b,
    }
}

/// Indices of `old` and `new` elements with no order-insensitive partner.
fn unmatched(old: &[serde_yaml::Value], new: &[serde_yaml::Value]) -> (Vec<usize>, Vec<usize>) {
    let mut remaining: Vec<usize> = (0..new.len()).collect();
    let mut removed = Vec::new();
    for (i, item) in old.iter().enumerate() {
        match remaining.iter().position(|&j| same(item, &new[j])) {
            Some(pos) => {
                remaining.remove(pos);
            }
            None => removed.push(i),
        }
    }
    (removed, remaining)
}

fn diff_values(path: String, old: &serde_yaml::Value, new: &serde_yaml::Value, out: &mut Vec<BundleChange>) {
    use serde_yaml::Value;
    match (old, new) {
        (Value::Mapping(a), Value::Mapping(b)) => {
            for (key, value) in a {
                match b.get(key) {
                    Some(other) => diff_values(child_path(&path, key), value, other, out),
                    None => out.push(BundleChange::Removed {
                        path: child_path(&path, key),
                        value: value.clone(),
                    }),
                }
            }
            for (key, value) in b {
                if !a.contains_key(key) {
                    out.push(BundleChange::Added {
                        path: child_path(&path, key),
                        value: value.clone(),
                    });
                }
            }
        }
        (Value::Sequence(a), Value::Sequence(b)) => {
            let (removed, added) = unmatched(a, b);
            for i in removed {
                out.push(BundleChange::Removed {
                    path: format!("{}[{}]", path, i),
                    value: a[i].clone(),
                });
            }
            for j in added {
                out.push(BundleChange::Added {
                    path: format!("{}[{}]", path, j),
                    value: b[j].clone(),
                });
            }
        }
        _ if same(old, new) => {}
        _ => out.push(BundleChange::Changed {
            path,
            old: old.clone(),
            new: new.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_extras() {
        let yaml = r#"
bundle: kubernetes
name: kubeflow
applications:
  zeta:
    charm: zeta-k8s
    channel: latest/edge
    scale: 1
    trust: true
  admission-webhook:
    charm: admission-webhook
    channel: 1.8/stable
    _github_repo_name: admission-webhook-operator
  kfp-api:
    charm: kfp-api
    channel: 2.0/stable
    _github_repo_name: kfp-operators
    _github_repo_owner: someone-else
    _path_in_github_repo: charms/kfp-api
"#;
        let bundle = Bundle::from_yaml(yaml).unwrap();
        let names: Vec<&str> = bundle.applications.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "admission-webhook", "kfp-api"]);

        let zeta = bundle.application("zeta").unwrap();
        assert_eq!(zeta.extra["scale"], serde_yaml::Value::from(1));
        assert!(zeta.github_repo_name.is_none());
        assert_eq!(zeta.repo_owner(), "canonical");
        assert_eq!(zeta.repo_path(), "./");

        let kfp = bundle.application("kfp-api").unwrap();
        assert_eq!(kfp.repo_owner(), "someone-else");
        assert_eq!(kfp.repo_path(), "charms/kfp-api");
    }

    const KUBEFLOW: &str = r#"
bundle: kubernetes
applications:
  kfp-api:
    charm: kfp-api
    channel: 2.0/stable
    constraints: [mem=1G, cores=2]
  kfp-ui:
    charm: kfp-ui
    channel: 2.0/stable
relations:
  - [kfp-api, kfp-ui]
"#;

    #[test]
    fn test_diff_ignores_order() {
        let reordered = r#"
relations:
  - [kfp-api, kfp-ui]
applications:
  kfp-ui:
    channel: 2.0/stable
    charm: kfp-ui
  kfp-api:
    constraints: [cores=2, mem=1G]
    charm: kfp-api
    channel: 2.0/stable
bundle: kubernetes
"#;
        let a = Bundle::from_yaml(KUBEFLOW).unwrap();
        let b = Bundle::from_yaml(reordered).unwrap();
        assert!(a.diff(&b).is_empty());
        assert!(a.same_content(&b));
    }

    #[test]
    fn test_diff_reports_changes() {
        let edited = r#"
bundle: kubernetes
applications:
  kfp-api:
    charm: kfp-api
    channel: 2.1/stable
    constraints: [mem=2G, cores=2]
  kfp-db:
    charm: mysql-k8s
relations:
  - [kfp-api, kfp-ui]
"#;
        let a = Bundle::from_yaml(KUBEFLOW).unwrap();
        let b = Bundle::from_yaml(edited).unwrap();
        let changes = a.diff(&b);
        let lines: Vec<String> = changes.iter().map(|c| c.to_string()).collect();

        assert_eq!(
            lines,
            [
                "~ applications.kfp-api.channel: 2.0/stable -> 2.1/stable",
                "- applications.kfp-api.constraints[0]: mem=1G",
                "+ applications.kfp-api.constraints[0]: mem=2G",
                "- applications.kfp-ui: {\"charm\":\"kfp-ui\",\"channel\":\"2.0/stable\"}",
                "+ applications.kfp-db: {\"charm\":\"mysql-k8s\"}",
            ]
        );
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_application_without_charm_is_rejected() {
        let yaml = "applications:\n  broken:\n    channel: latest/edge\n";
        let err = Bundle::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
