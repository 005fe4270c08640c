//! Finding bundle tracks that do not exist on Charmhub yet.
//!
//! Channel maps come from `juju info <charm> --format yaml`; a track is
//! missing when no channel of the charm starts with the track the bundle
//! asks for.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::bundle::{Application, Bundle};
use crate::error::OpsError;
use crate::process::run_command;

pub const JUJU: &str = "juju";

/// Forum category for Charmhub track requests.
pub const TRACK_REQUEST_URL: &str = "https://discourse.charmhub.io/c/charmhub-requests";

/// Channel name (`1.8/stable`) to its `juju info` details.
pub type ChannelMap = BTreeMap<String, serde_yaml::Value>;

#[async_trait]
pub trait CharmInfo: Send + Sync {
    async fn channel_map(&self, charm: &str) -> Result<ChannelMap, OpsError>;
}

/// Reads channel maps through the `juju` CLI.
#[derive(Debug, Clone)]
pub struct Juju {
    program: String,
}

impl Default for Juju {
    fn default() -> Self {
        Self::with_program(JUJU)
    }
}

impl Juju {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CharmInfo for Juju {
    async fn channel_map(&self, charm: &str) -> Result<ChannelMap, OpsError> {
        let stdout = run_command(&self.program, &["info", charm, "--format", "yaml"]).await?;
        parse_channel_map(charm, &stdout)
    }
}

/// The `channel-map` section of `juju info --format yaml` output.
pub fn parse_channel_map(charm: &str, info_yaml: &str) -> Result<ChannelMap, OpsError> {
    let invalid = || OpsError::Validation(format!("Failed to load valid yaml from `juju info {}`", charm));

    let info: serde_yaml::Value = serde_yaml::from_str(info_yaml).map_err(|_| invalid())?;
    let channels = info
        .get("channel-map")
        .and_then(|v| v.as_mapping())
        .ok_or_else(invalid)?;

    let mut map = ChannelMap::new();
    for (channel, details) in channels {
        if let Some(channel) = channel.as_str() {
            map.insert(channel.to_string(), details.clone());
        }
    }
    Ok(map)
}

/// Channel maps for every charm the bundle deploys, keyed by charm name.
///
/// Several applications may deploy one charm; it is looked up once. Charms
/// that cannot be looked up are left out with a warning.
pub async fn channel_maps<I: CharmInfo>(info: &I, bundle: &Bundle) -> BTreeMap<String, ChannelMap> {
    let mut maps = BTreeMap::new();

    for (name, app) in &bundle.applications {
        if maps.contains_key(&app.charm) {
            tracing::debug!("[Tracks] Charm {} of {} already looked up", app.charm, name);
            continue;
        }
        match info.channel_map(&app.charm).await {
            Ok(map) => {
                maps.insert(app.charm.clone(), map);
            }
            Err(err) => {
                tracing::warn!(
                    "[Tracks] Failed getting info for application '{}'. Does charm {} exist? {}",
                    name,
                    app.charm,
                    err
                );
            }
        }
    }

    maps
}

/// Charm to track for applications whose track has no channel yet.
///
/// Charms without a channel map and applications without a channel are
/// not reported.
pub fn missing_tracks(
    applications: &[(String, Application)],
    maps: &BTreeMap<String, ChannelMap>,
) -> BTreeMap<String, String> {
    let mut missing = BTreeMap::new();

    for (name, app) in applications {
        let Some(map) = maps.get(&app.charm) else {
            continue;
        };
        let Some(channel) = app.channel.as_deref() else {
            tracing::warn!("[Tracks] Application {} has no channel, skipping", name);
            continue;
        };
        let track = channel.split('/').next().unwrap_or(channel);
        if !map.keys().any(|c| c.starts_with(track)) {
            missing.insert(app.charm.clone(), track.to_string());
        }
    }

    missing
}

/// Report ready to paste into a Charmhub track request.
pub fn missing_track_summary(missing: &BTreeMap<String, String>) -> String {
    if missing.is_empty() {
        return "All tracks are present".to_string();
    }

    let mut out = format!(
        "At least one track in the bundle found missing.  To create this track, submit the below request to: {}\n\n",
        TRACK_REQUEST_URL
    );
    out.push_str("Subject:\nRequest: Add tracks to Charms\n\n");
    out.push_str("Body:\nHello!  Can we please add the following tracks to the cited charms?  Thanks!\n\n");
    out.push_str("\tCharm: Track\n");
    for (charm, track) in missing {
        out.push_str(&format!("\n\t{}: {}", charm, track));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const INFO: &str = r#"
name: kubeflow-profiles
description: Kubeflow Profiles and Access Management
channel-map:
  1.4/edge:
    track: "1.4"
    risk: edge
    revision: 63
  1.4/stable:
    track: "1.4"
    risk: stable
    revision: 63
  latest/edge:
    track: latest
    risk: edge
    revision: 80
"#;

    const BUNDLE: &str = r#"
applications:
  kubeflow-profiles:
    charm: kubeflow-profiles
    channel: 1.4/stable
  profiles-next:
    charm: kubeflow-profiles
    channel: 1.8/stable
  unknown:
    charm: not-a-charm
    channel: 1.0/stable
  no-channel:
    charm: kubeflow-profiles
"#;

    #[derive(Default)]
    struct FakeInfo {
        lookups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CharmInfo for FakeInfo {
        async fn channel_map(&self, charm: &str) -> Result<ChannelMap, OpsError> {
            self.lookups.lock().unwrap().push(charm.to_string());
            match charm {
                "kubeflow-profiles" => parse_channel_map(charm, INFO),
                _ => Err(OpsError::Command {
                    command: format!("juju info {}", charm),
                    message: "ERROR No charm or bundle with name".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_parse_channel_map() {
        let map = parse_channel_map("kubeflow-profiles", INFO).unwrap();
        let channels: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(channels, ["1.4/edge", "1.4/stable", "latest/edge"]);
        assert_eq!(map["1.4/stable"]["revision"], serde_yaml::Value::from(63));

        let err = parse_channel_map("ghost", "").unwrap_err();
        assert!(err.to_string().contains("juju info ghost"));
        assert!(parse_channel_map("ghost", "name: ghost\n").is_err());
    }

    #[tokio::test]
    async fn test_channel_maps_looks_up_each_charm_once() {
        let bundle = Bundle::from_yaml(BUNDLE).unwrap();
        let info = FakeInfo::default();

        let maps = channel_maps(&info, &bundle).await;
        assert_eq!(maps.keys().map(String::as_str).collect::<Vec<_>>(), ["kubeflow-profiles"]);
        assert_eq!(
            info.lookups.lock().unwrap().as_slice(),
            ["kubeflow-profiles".to_string(), "not-a-charm".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_tracks() {
        let bundle = Bundle::from_yaml(BUNDLE).unwrap();
        let maps = channel_maps(&FakeInfo::default(), &bundle).await;

        let missing = missing_tracks(&bundle.applications, &maps);
        assert_eq!(missing, BTreeMap::from([("kubeflow-profiles".to_string(), "1.8".to_string())]));
    }

    #[test]
    fn test_missing_track_summary() {
        assert_eq!(missing_track_summary(&BTreeMap::new()), "All tracks are present");

        let missing = BTreeMap::from([
            ("kfp-api".to_string(), "2.1".to_string()),
            ("admission-webhook".to_string(), "1.9".to_string()),
        ]);
        let summary = missing_track_summary(&missing);
        assert!(summary.starts_with("At least one track in the bundle found missing."));
        assert!(summary.contains(TRACK_REQUEST_URL));
        assert!(summary.contains("Subject:\nRequest: Add tracks to Charms"));
        assert!(summary.ends_with("\tCharm: Track\n\n\tadmission-webhook: 1.9\n\tkfp-api: 2.1"));
    }
}
