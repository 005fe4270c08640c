//! `charmops create-branches`: cut `track/<version>` branches for a bundle.

use charmops_core::branches::{create_track_branches, plan_branches, track_branches, BranchApi, BranchCreation, TrackBranch};
use charmops_core::bundle::Bundle;

use super::{fail, github_client};

#[derive(Debug, Clone)]
pub struct BranchArgs {
    pub bundle: String,
    pub dry_run: bool,
    pub pat_env_var: String,
    pub api_url: Option<String>,
}

pub async fn run(args: &BranchArgs) -> Result<(), String> {
    let bundle = Bundle::from_file(&args.bundle).map_err(fail)?;
    let branches = track_branches(&bundle);
    println!("📄 Loaded bundle: {} ({} track branch(es))", args.bundle, branches.len());

    if args.dry_run {
        tracing::info!("[Branches] Dry run, no branches will be created");
        for line in plan_branches(&branches) {
            println!("   {}", line);
        }
        println!("\nDry run complete; pass --dry-run false to execute.");
        return Ok(());
    }

    let client = github_client(&args.pat_env_var, args.api_url.as_deref())?;
    execute(&client, &branches).await
}

/// Create every branch through `api` and turn the report into the command result.
pub async fn execute<A: BranchApi>(api: &A, branches: &[TrackBranch]) -> Result<(), String> {
    let report = create_track_branches(api, branches).await;

    println!();
    for outcome in &report.outcomes {
        let name = outcome.branch.branch_name();
        match &outcome.result {
            Ok(BranchCreation::Created) => println!("   ✅ {} created in {}", name, outcome.branch.repository),
            Ok(BranchCreation::AlreadyExists) => {
                println!("   ➖ {} already exists in {}", name, outcome.branch.repository)
            }
            Err(err) => println!("   ❌ {} in {}: {}", name, outcome.branch.repository, err),
        }
    }

    if report.success() {
        Ok(())
    } else {
        let failed: Vec<String> = report.failures().map(|o| o.branch.repository.to_string()).collect();
        Err(format!("{} branch(es) could not be created: {}", failed.len(), failed.join(", ")))
    }
}
