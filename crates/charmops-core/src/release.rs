//! Release and promote manifests built from a pair of bundles.
//!
//! The source bundle says where charms are now, the destination bundle says
//! where they should be released to. Every team-managed application whose
//! channel differs between the two becomes one `release.yaml` dispatch.

use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::bundle::{Application, Bundle};
use crate::dispatch::{DispatchManifest, WorkflowSpec};
use crate::error::{self, OpsError};
use crate::github::RepoSlug;

pub const RELEASE_WORKFLOW: &str = "release.yaml";
pub const DEFAULT_RELEASE_MANIFEST: &str = "dispatch_manifest.yaml";
pub const DEFAULT_PROMOTE_MANIFEST: &str = "promote-manifest.yaml";

/// Why an application pair did not produce a dispatch.
enum Rejection {
    /// Not a release; skip and carry on
    Skip(String),
    /// The bundles disagree in a way that needs fixing
    Invalid(OpsError),
}

fn invalid(msg: String) -> Rejection {
    Rejection::Invalid(OpsError::Validation(msg))
}

/// Build the release dispatch manifest for `source` → `destination`.
pub fn release_manifest(source: &Bundle, destination: &Bundle) -> Result<DispatchManifest, OpsError> {
    let mut manifest = DispatchManifest::default();

    for (name, source_app) in &source.applications {
        match release_dispatch(name, source_app, destination) {
            Ok(spec) => {
                tracing::info!(
                    "[Release] Application {} causing release of charm {} from {}->{}",
                    name,
                    source_app.charm,
                    spec.inputs["origin-channel"],
                    spec.inputs["destination-channel"]
                );
                manifest.entries.push(spec);
            }
            Err(Rejection::Skip(reason)) => {
                tracing::info!("[Release] {}  Skipping.", reason);
            }
            Err(Rejection::Invalid(err)) => return Err(err),
        }
    }

    Ok(manifest)
}

fn release_dispatch(
    name: &str,
    source_app: &Application,
    destination: &Bundle,
) -> Result<WorkflowSpec, Rejection> {
    if source_app.github_repo_name.is_none() {
        return Err(Rejection::Skip(format!(
            "Application {} is missing required variable _github_repo_name and likely is not \
             controlled by our team.",
            name
        )));
    }

    let destination_app = matching_application(name, source_app, destination)?;
    tracing::info!("[Release] Application {} found in both bundles and requiring release.", name);

    let repository = repository(source_app, destination_app)?;
    let path = path_in_repo(source_app, destination_app)?;

    let origin = source_app.channel.clone().unwrap_or_default();
    let target = destination_app.channel.clone().unwrap_or_default();
    let mut spec = WorkflowSpec::new(repository, RELEASE_WORKFLOW)
        .with_input("origin-channel", origin)
        .with_input("destination-channel", target);

    // Non-root charms must live at charms/<charm-name>; release.yaml
    // derives the charm directory from the name.
    if !path.is_empty() {
        if path.len() != 2 || path[0] != "charms" {
            return Err(invalid(format!(
                "_path_in_github_repo must be './' or './charms/<charm-name>' for multi-charm \
                 repos. Got '{}'",
                source_app.repo_path()
            )));
        }
        spec = spec.with_input("charm-name", path[1].clone());
    }

    Ok(spec)
}

fn matching_application<'a>(
    name: &str,
    source_app: &Application,
    destination: &'a Bundle,
) -> Result<&'a Application, Rejection> {
    let destination_app = destination.application(name).ok_or_else(|| {
        Rejection::Skip(format!("Application {} not found in destination bundle.", name))
    })?;

    if source_app.charm != destination_app.charm {
        return Err(Rejection::Skip(format!(
            "Source and destination charms for application {} do not match. Got {}, {}, \
             respectively.",
            name, source_app.charm, destination_app.charm
        )));
    }

    if source_app.channel == destination_app.channel {
        return Err(Rejection::Skip(format!(
            "Source and destination for application {} both reference the same channel.",
            name
        )));
    }

    Ok(destination_app)
}

fn repository(source_app: &Application, destination_app: &Application) -> Result<RepoSlug, Rejection> {
    let (Some(source_name), Some(destination_name)) = (
        source_app.github_repo_name.as_deref(),
        destination_app.github_repo_name.as_deref(),
    ) else {
        return Err(Rejection::Skip(format!(
            "Application would have been released from {}->{}, but one or both are missing the \
             required additional variable _github_repo_name",
            source_app.channel.as_deref().unwrap_or("?"),
            destination_app.channel.as_deref().unwrap_or("?")
        )));
    };

    let source_repo = RepoSlug::new(source_app.repo_owner(), source_name);
    let destination_repo = RepoSlug::new(destination_app.repo_owner(), destination_name);
    if source_repo != destination_repo {
        return Err(invalid(format!(
            "Source and destination repositories do not match. Got {} and {}, respectively.",
            source_repo, destination_repo
        )));
    }
    Ok(source_repo)
}

/// Normalised components of `_path_in_github_repo`; empty means the repo root.
fn path_in_repo(source_app: &Application, destination_app: &Application) -> Result<Vec<String>, Rejection> {
    let source_raw = source_app.repo_path();
    let destination_raw = destination_app.repo_path();

    let source_parts = path_parts(source_raw);
    let destination_parts = path_parts(destination_raw);
    if source_parts != destination_parts || is_absolute(source_raw) != is_absolute(destination_raw) {
        return Err(invalid(format!(
            "Source and destination _path_in_github_repo do not match. Got {} and {}, \
             respectively.",
            source_raw, destination_raw
        )));
    }

    if is_absolute(source_raw) {
        return Err(invalid(format!(
            "_path_in_github_repo must be a relative path to the top of the GitHub repository. \
             Got '{}'",
            source_raw
        )));
    }

    Ok(source_parts)
}

fn is_absolute(raw: &str) -> bool {
    Path::new(raw).has_root()
}

fn path_parts(raw: &str) -> Vec<String> {
    raw.split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .map(str::to_string)
        .collect()
}

/// One charm to promote between channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoteEntry {
    pub charm: String,
    #[serde(rename = "source-channel")]
    pub source_channel: String,
    #[serde(rename = "destination-channel")]
    pub destination_channel: String,
}

/// `applications: {name: {charm, source-channel, destination-channel}}`, in bundle order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromoteManifest {
    pub applications: Vec<(String, PromoteEntry)>,
}

struct OrderedApplications<'a>(&'a [(String, PromoteEntry)]);

impl Serialize for OrderedApplications<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, entry) in self.0 {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl Serialize for PromoteManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("applications", &OrderedApplications(&self.applications))?;
        map.end()
    }
}

/// Entry as written on disk; any field may be missing.
#[derive(Debug, Deserialize)]
struct RawPromoteEntry {
    #[serde(default)]
    charm: Option<String>,
    #[serde(default, rename = "source-channel")]
    source_channel: Option<String>,
    #[serde(default, rename = "destination-channel")]
    destination_channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPromoteManifest {
    #[serde(default)]
    applications: serde_yaml::Mapping,
}

impl PromoteEntry {
    /// Both channels are known, so the entry can be promoted.
    pub fn is_complete(&self) -> bool {
        !self.source_channel.is_empty() && !self.destination_channel.is_empty()
    }
}

impl PromoteManifest {
    /// Parse a promotion manifest, keeping file order. Missing fields read as empty.
    pub fn from_yaml(yaml: &str) -> Result<Self, OpsError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawPromoteManifest = serde_yaml::from_str(yaml)?;
        let mut applications = Vec::with_capacity(raw.applications.len());
        for (key, value) in raw.applications {
            let name = key
                .as_str()
                .ok_or_else(|| OpsError::Validation(format!("Application name {:?} is not a string", key)))?
                .to_string();
            let entry: RawPromoteEntry = serde_yaml::from_value(value)
                .map_err(|e| OpsError::Validation(format!("Invalid promotion for '{}': {}", name, e)))?;
            applications.push((
                name,
                PromoteEntry {
                    charm: entry.charm.unwrap_or_default(),
                    source_channel: entry.source_channel.unwrap_or_default(),
                    destination_channel: entry.destination_channel.unwrap_or_default(),
                },
            ));
        }
        Ok(Self { applications })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OpsError> {
        Self::from_yaml(&error::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    pub fn to_yaml(&self) -> Result<String, OpsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), OpsError> {
        error::write_string(path, &self.to_yaml()?)
    }
}

/// Pair every source application with its destination channel.
///
/// Dependencies (`_github_dependency_repo_name`) are not promoted.
pub fn promote_manifest(source: &Bundle, destination: &Bundle) -> PromoteManifest {
    let mut manifest = PromoteManifest::default();

    for (name, source_app) in &source.applications {
        let Some(destination_app) = destination.application(name) else {
            continue;
        };
        if source_app.github_dependency_repo_name.is_some() {
            tracing::debug!("[Promote] {} is a dependency, not promoting", name);
            continue;
        }
        let (Some(source_channel), Some(destination_channel)) =
            (&source_app.channel, &destination_app.channel)
        else {
            tracing::warn!("[Promote] {} has no channel in one of the bundles, skipping", name);
            continue;
        };

        manifest.applications.push((
            name.clone(),
            PromoteEntry {
                charm: source_app.charm.clone(),
                source_channel: source_channel.clone(),
                destination_channel: destination_channel.clone(),
            },
        ));
    }

    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
applications:
  single:
    charm: single-charm
    channel: latest/edge
    _github_repo_name: single-charm-operator
  multi:
    charm: multi-a
    channel: latest/edge
    _github_repo_name: multi-operators
    _path_in_github_repo: ./charms/multi-a
  unmanaged:
    charm: mysql-k8s
    channel: 8.0/stable
  same-channel:
    charm: same
    channel: 1.0/stable
    _github_repo_name: same-operator
  only-in-source:
    charm: lonely
    channel: latest/edge
    _github_repo_name: lonely-operator
"#;

    const DESTINATION: &str = r#"
applications:
  single:
    charm: single-charm
    channel: 1.8/stable
    _github_repo_name: single-charm-operator
  multi:
    charm: multi-a
    channel: 1.8/stable
    _github_repo_name: multi-operators
    _path_in_github_repo: charms/multi-a/
  unmanaged:
    charm: mysql-k8s
    channel: 8.0/edge
  same-channel:
    charm: same
    channel: 1.0/stable
    _github_repo_name: same-operator
"#;

    fn bundles() -> (Bundle, Bundle) {
        (
            Bundle::from_yaml(SOURCE).unwrap(),
            Bundle::from_yaml(DESTINATION).unwrap(),
        )
    }

    #[test]
    fn test_release_manifest_picks_managed_channel_changes() {
        let (source, destination) = bundles();
        let manifest = release_manifest(&source, &destination).unwrap();
        assert_eq!(manifest.len(), 2);

        let single = &manifest.entries[0];
        assert_eq!(single.repository.to_string(), "canonical/single-charm-operator");
        assert_eq!(single.workflow_name, "release.yaml");
        assert_eq!(single.inputs["origin-channel"], "latest/edge");
        assert_eq!(single.inputs["destination-channel"], "1.8/stable");
        assert!(!single.inputs.contains_key("charm-name"));

        let multi = &manifest.entries[1];
        assert_eq!(multi.repository.to_string(), "canonical/multi-operators");
        assert_eq!(multi.inputs["charm-name"], "multi-a");
    }

    #[test]
    fn test_mismatched_repositories_fail() {
        let (source, _) = bundles();
        let destination = Bundle::from_yaml(
            "applications:\n  single:\n    charm: single-charm\n    channel: 1.8/stable\n    \
             _github_repo_name: single-charm-operator\n    _github_repo_owner: elsewhere\n",
        )
        .unwrap();
        let err = release_manifest(&source, &destination).unwrap_err();
        assert!(err.to_string().contains("repositories do not match"));
    }

    #[test]
    fn test_mismatched_paths_fail() {
        let source = Bundle::from_yaml(
            "applications:\n  a:\n    charm: a\n    channel: x/edge\n    _github_repo_name: r\n    \
             _path_in_github_repo: charms/a\n",
        )
        .unwrap();
        let destination = Bundle::from_yaml(
            "applications:\n  a:\n    charm: a\n    channel: x/stable\n    _github_repo_name: r\n    \
             _path_in_github_repo: charms/b\n",
        )
        .unwrap();
        assert!(release_manifest(&source, &destination).is_err());
    }

    #[test]
    fn test_absolute_and_deep_paths_fail() {
        for path in ["/charms/a", "charms/a/nested", "operators/a"] {
            let yaml = |channel: &str| {
                format!(
                    "applications:\n  a:\n    charm: a\n    channel: {}\n    _github_repo_name: r\n    \
                     _path_in_github_repo: {}\n",
                    channel, path
                )
            };
            let source = Bundle::from_yaml(&yaml("x/edge")).unwrap();
            let destination = Bundle::from_yaml(&yaml("x/stable")).unwrap();
            assert!(
                release_manifest(&source, &destination).is_err(),
                "path {path} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_destination_repo_name_is_skipped() {
        let (source, _) = bundles();
        let destination =
            Bundle::from_yaml("applications:\n  single:\n    charm: single-charm\n    channel: 1.8/stable\n")
                .unwrap();
        assert!(release_manifest(&source, &destination).unwrap().is_empty());
    }

    #[test]
    fn test_promote_manifest() {
        let source = Bundle::from_yaml(
            r#"
applications:
  b-app:
    charm: b
    channel: latest/edge
  a-app:
    charm: a
    channel: latest/edge
  dep:
    charm: dep
    channel: latest/edge
    _github_dependency_repo_name: dep-operator
  missing:
    charm: missing
    channel: latest/edge
"#,
        )
        .unwrap();
        let destination = Bundle::from_yaml(
            r#"
applications:
  a-app:
    charm: a
    channel: 1.9/stable
  b-app:
    charm: b
    channel: 1.9/stable
  dep:
    charm: dep
    channel: 1.9/stable
"#,
        )
        .unwrap();

        let manifest = promote_manifest(&source, &destination);
        let names: Vec<&str> = manifest.applications.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["b-app", "a-app"]);

        let yaml = manifest.to_yaml().unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["applications"]["a-app"]["source-channel"], "latest/edge");
        assert_eq!(value["applications"]["a-app"]["destination-channel"], "1.9/stable");
        assert_eq!(value["applications"]["b-app"]["charm"], "b");
        assert!(yaml.find("b-app").unwrap() < yaml.find("a-app").unwrap());
    }

    #[test]
    fn test_promote_manifest_reads_back_in_order() {
        let yaml = r#"
applications:
  zeta:
    charm: zeta
    source-channel: latest/edge
    destination-channel: 1.9/stable
  alpha:
    charm: alpha
    source-channel: latest/edge
  beta:
    charm: beta
    source-channel: null
    destination-channel: 1.9/stable
"#;
        let manifest = PromoteManifest::from_yaml(yaml).unwrap();
        let names: Vec<&str> = manifest.applications.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "beta"]);
        assert!(manifest.applications[0].1.is_complete());
        assert!(!manifest.applications[1].1.is_complete());
        assert!(!manifest.applications[2].1.is_complete());
        assert!(PromoteManifest::from_yaml("").unwrap().is_empty());
    }
}
