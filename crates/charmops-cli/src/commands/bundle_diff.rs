//! `charmops bundle-diff`: structural differences between two bundles.

use charmops_core::bundle::Bundle;

use super::fail;

/// Print each difference; the result is `true` when the bundles match.
pub fn run(left: &str, right: &str) -> Result<bool, String> {
    let left_bundle = Bundle::from_file(left).map_err(fail)?;
    let right_bundle = Bundle::from_file(right).map_err(fail)?;

    let changes = left_bundle.diff(&right_bundle);
    if changes.is_empty() {
        println!("{} and {} are equivalent", left, right);
        return Ok(true);
    }

    println!("{} difference(s) from {} to {}:", changes.len(), left, right);
    for change in &changes {
        println!("   {}", change);
    }
    Ok(false)
}
