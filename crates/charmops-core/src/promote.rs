//! Promoting charms between Charmhub channels with `charmcraft promote`.
//!
//! Entries run one at a time in manifest order. A failed promotion is
//! recorded and the remaining entries still run.

use async_trait::async_trait;

use crate::error::OpsError;
use crate::process::run_command;
use crate::release::{PromoteEntry, PromoteManifest};

pub const CHARMCRAFT: &str = "charmcraft";

/// The store operation a promotion needs.
#[async_trait]
pub trait CharmStore: Send + Sync {
    /// Release the revision on `from_channel` of `charm` to `to_channel`.
    async fn promote(&self, charm: &str, from_channel: &str, to_channel: &str) -> Result<(), OpsError>;
}

/// Promotes through the `charmcraft` CLI, which must already be logged in.
#[derive(Debug, Clone)]
pub struct Charmcraft {
    program: String,
}

impl Default for Charmcraft {
    fn default() -> Self {
        Self::with_program(CHARMCRAFT)
    }
}

impl Charmcraft {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CharmStore for Charmcraft {
    async fn promote(&self, charm: &str, from_channel: &str, to_channel: &str) -> Result<(), OpsError> {
        run_command(
            &self.program,
            &[
                "promote",
                "--name",
                charm,
                "--from-channel",
                from_channel,
                "--to-channel",
                to_channel,
                "--yes",
            ],
        )
        .await
        .map(|_| ())
    }
}

#[derive(Debug)]
pub struct PromotionOutcome {
    pub application: String,
    pub entry: PromoteEntry,
    pub result: Result<(), OpsError>,
}

#[derive(Debug, Default)]
pub struct PromotionReport {
    pub outcomes: Vec<PromotionOutcome>,
    /// Applications without both channels; never attempted
    pub skipped: Vec<String>,
}

impl PromotionReport {
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PromotionOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Banner listing every failed promotion, or `None` when all went through.
    pub fn error_summary(&self) -> Option<String> {
        let mut lines: Vec<String> = Vec::new();
        for outcome in self.failures() {
            if let Err(err) = &outcome.result {
                lines.push(format!("  {}: {}", outcome.application, err));
            }
        }
        if lines.is_empty() {
            return None;
        }
        let rule = "#".repeat(46);
        Some(format!(
            "{rule}\nExecution completed with the following errors:\n{}\n{rule}",
            lines.join("\n")
        ))
    }
}

fn promotable(manifest: &PromoteManifest) -> impl Iterator<Item = &(String, PromoteEntry)> {
    manifest.applications.iter().filter(|(name, entry)| {
        if !entry.is_complete() {
            tracing::warn!("[Promote] {} is missing a source or destination channel, skipping", name);
        }
        entry.is_complete()
    })
}

/// What a live run would promote.
pub fn plan_promotions(manifest: &PromoteManifest) -> Vec<String> {
    promotable(manifest)
        .map(|(name, entry)| {
            format!(
                "Dry run: would promote {} ({}) from {} to {}",
                name, entry.charm, entry.source_channel, entry.destination_channel
            )
        })
        .collect()
}

/// Promote every complete entry in order, continuing past failures.
pub async fn promote_all<S: CharmStore>(store: &S, manifest: &PromoteManifest) -> PromotionReport {
    let mut report = PromotionReport::default();

    for (name, entry) in &manifest.applications {
        if !entry.is_complete() {
            tracing::warn!("[Promote] {} is missing a source or destination channel, skipping", name);
            report.skipped.push(name.clone());
            continue;
        }

        tracing::info!(
            "[Promote] Promoting {} from {} to {}",
            name,
            entry.source_channel,
            entry.destination_channel
        );
        let result = store
            .promote(&entry.charm, &entry.source_channel, &entry.destination_channel)
            .await;
        if let Err(err) = &result {
            tracing::error!("[Promote] Error promoting {}: {}", name, err);
        }

        report.outcomes.push(PromotionOutcome {
            application: name.clone(),
            entry: entry.clone(),
            result,
        });
    }

    report
}
