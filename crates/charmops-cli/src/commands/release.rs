//! `charmops release-manifest`: build a dispatch manifest from two bundles.

use charmops_core::bundle::Bundle;
use charmops_core::release::release_manifest;

use super::fail;

pub fn run(source_bundle: &str, destination_bundle: &str, output: &str) -> Result<(), String> {
    let source = Bundle::from_file(source_bundle).map_err(fail)?;
    let destination = Bundle::from_file(destination_bundle).map_err(fail)?;

    let manifest = release_manifest(&source, &destination).map_err(fail)?;
    manifest.write_to(output).map_err(fail)?;

    println!(
        "✅ Wrote {} release dispatch(es) to {}",
        manifest.len(),
        output
    );
    for spec in &manifest.entries {
        println!("   - {} {:?}", spec, spec.inputs);
    }
    Ok(())
}
