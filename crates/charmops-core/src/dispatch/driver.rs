//! Manifest driver: runs every dispatch in a manifest, in order.
//!
//! A failing entry never stops the ones after it: each failure is logged
//! with its workflow and repository and recorded in the [`ManifestReport`].

use super::dispatcher::{Dispatcher, WorkflowApi};
use super::error::DispatchError;
use super::schema::{DispatchManifest, ExecutionRecord, WorkflowSpec};

/// Result of one manifest entry.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub spec: WorkflowSpec,
    pub result: Result<ExecutionRecord, DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a whole manifest.
#[derive(Debug, Default)]
pub struct ManifestReport {
    pub outcomes: Vec<DispatchOutcome>,
}

impl ManifestReport {
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(DispatchOutcome::is_success)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DispatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Describe what a live run would do, without touching the network.
pub fn plan_manifest(manifest: &DispatchManifest) -> Vec<String> {
    manifest
        .entries
        .iter()
        .map(|spec| {
            let line = format!(
                "Dry run: would execute workflow {} in repository {} with inputs {:?}",
                spec.workflow_name, spec.repository, spec.inputs
            );
            tracing::info!("[Dispatch] {}", line);
            line
        })
        .collect()
}

/// Dispatch and await every entry, one at a time, in manifest order.
pub async fn run_manifest<A: WorkflowApi>(
    dispatcher: &Dispatcher<A>,
    manifest: &DispatchManifest,
) -> ManifestReport {
    let total = manifest.len();
    let mut report = ManifestReport::default();

    for (i, spec) in manifest.entries.iter().enumerate() {
        tracing::info!("[Dispatch] ({}/{}) {}", i + 1, total, spec);

        let result = dispatcher.run(spec).await;
        match &result {
            Ok(run) => tracing::info!(
                "[Dispatch] Workflow {} in repository {} succeeded: {}",
                spec.workflow_name,
                spec.repository,
                run.html_url
            ),
            Err(err) => tracing::error!(
                "[Dispatch] Workflow {} in repository {} failed ({}): {}",
                spec.workflow_name,
                spec.repository,
                err.kind(),
                err
            ),
        }

        report.outcomes.push(DispatchOutcome {
            spec: spec.clone(),
            result,
        });
    }

    tracing::info!(
        "[Dispatch] Manifest complete: {}/{} dispatch(es) succeeded",
        report.succeeded(),
        total
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lists_every_entry() {
        let yaml = r#"
- repository: "canonical/a-operator"
  workflow_name: "release.yaml"
  inputs:
    origin-channel: "latest/edge"
- repository: "canonical/b-operator"
  workflow_name: "publish.yaml"
"#;
        let manifest = DispatchManifest::from_yaml(yaml).unwrap();
        let plan = plan_manifest(&manifest);
        assert_eq!(plan.len(), 2);
        assert!(plan[0].contains("release.yaml in repository canonical/a-operator"));
        assert!(plan[0].contains("latest/edge"));
        assert!(plan[1].contains("publish.yaml"));
    }
}
