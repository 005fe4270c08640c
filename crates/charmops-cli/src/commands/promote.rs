//! `charmops promote-manifest` pairs bundle channels for promotion;
//! `charmops promote` runs the resulting manifest through charmcraft.

use charmops_core::bundle::Bundle;
use charmops_core::promote::{plan_promotions, promote_all, CharmStore, Charmcraft};
use charmops_core::release::{promote_manifest, PromoteManifest};

use super::fail;

pub fn run(source_bundle: &str, destination_bundle: &str, output: &str) -> Result<(), String> {
    let source = Bundle::from_file(source_bundle).map_err(fail)?;
    let destination = Bundle::from_file(destination_bundle).map_err(fail)?;

    let manifest = promote_manifest(&source, &destination);
    manifest.write_to(output).map_err(fail)?;

    println!("Promotion manifest saved to {}", output);
    Ok(())
}

/// Promote every entry of the manifest at `path`, or just list them in dry-run mode.
pub async fn promote(path: &str, dry_run: bool) -> Result<(), String> {
    let manifest = PromoteManifest::from_file(path).map_err(fail)?;
    println!("📄 Loaded promotion manifest: {} ({} application(s))", path, manifest.len());

    if dry_run {
        tracing::info!("[Promote] Dry run, nothing will be promoted");
        for line in plan_promotions(&manifest) {
            println!("   {}", line);
        }
        println!("\nDry run complete; pass --dry-run false to execute.");
        return Ok(());
    }

    execute(&Charmcraft::default(), &manifest).await
}

/// Promote every entry through `store` and turn the report into the command result.
pub async fn execute<S: CharmStore>(store: &S, manifest: &PromoteManifest) -> Result<(), String> {
    let report = promote_all(store, manifest).await;

    println!();
    for outcome in &report.outcomes {
        let marker = if outcome.result.is_ok() { "✅" } else { "❌" };
        println!(
            "   {} {} {} → {}",
            marker, outcome.application, outcome.entry.source_channel, outcome.entry.destination_channel
        );
    }
    for skipped in &report.skipped {
        println!("   ⏭️  {} (missing channel)", skipped);
    }

    match report.error_summary() {
        None => {
            println!("\n🎉 All promotions completed successfully!");
            Ok(())
        }
        Some(summary) => {
            println!("\n{}\n", summary);
            Err(format!("{} promotion(s) failed", report.failures().count()))
        }
    }
}
