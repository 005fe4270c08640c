//! `charmops dispatch`: execute and wait on a workflow dispatch manifest.

use std::time::Duration;

use charmops_core::dispatch::{plan_manifest, run_manifest, DispatchOptions, Dispatcher, ManifestReport, WorkflowApi};
use charmops_core::DispatchManifest;

use super::{fail, github_client};

/// Settings for a manifest run, collected from the command line.
#[derive(Debug, Clone)]
pub struct DispatchArgs {
    pub manifest: String,
    pub dry_run: bool,
    pub pat_env_var: String,
    pub api_url: Option<String>,
    pub git_ref: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl DispatchArgs {
    pub fn options(&self) -> DispatchOptions {
        DispatchOptions {
            git_ref: self.git_ref.clone(),
            timeout: self.timeout,
            poll_interval: self.poll_interval,
        }
    }
}

/// Run the manifest against GitHub, or just describe it in dry-run mode.
pub async fn run(args: &DispatchArgs) -> Result<(), String> {
    let manifest = DispatchManifest::from_file(&args.manifest).map_err(fail)?;
    println!("📄 Loaded dispatch manifest: {} ({} dispatch(es))", args.manifest, manifest.len());

    if args.dry_run {
        tracing::info!("[Dispatch] Dry run, no workflows will be dispatched");
        for line in plan_manifest(&manifest) {
            println!("   {}", line);
        }
        println!("\nDry run complete; pass --dry-run false to execute.");
        return Ok(());
    }

    let client = github_client(&args.pat_env_var, args.api_url.as_deref())?;
    let dispatcher = Dispatcher::with_options(client, args.options());

    execute(&dispatcher, &manifest).await
}

/// Execute every entry and turn the report into the command result.
pub async fn execute<A: WorkflowApi>(dispatcher: &Dispatcher<A>, manifest: &DispatchManifest) -> Result<(), String> {
    let report = run_manifest(dispatcher, manifest).await;
    print_report(&report);

    if report.success() {
        println!("\n🎉 All dispatches completed successfully!");
        Ok(())
    } else {
        let failed: Vec<String> = report.failures().map(|o| o.spec.to_string()).collect();
        Err(format!("{} dispatch(es) failed: {}", failed.len(), failed.join(", ")))
    }
}

fn print_report(report: &ManifestReport) {
    println!();
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(run) => println!("   ✅ {} → {}", outcome.spec, run.html_url),
            Err(err) => {
                println!("   ❌ {} [{}]: {}", outcome.spec, err.kind(), err);
                if let Some(run) = err.run() {
                    println!("      {}", run);
                }
            }
        }
    }
    println!(
        "\n   {}/{} dispatch(es) succeeded",
        report.succeeded(),
        report.outcomes.len()
    );
}
