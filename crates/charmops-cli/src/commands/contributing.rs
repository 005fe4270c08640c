//! `charmops contributing`: regenerate CONTRIBUTING.md and report drift.

use std::path::Path;

use charmops_core::contributing::{generate_and_compare, Comparison, CONTRIBUTING_FILE, OUTPUT_NAME};
use charmops_core::GithubOutput;

use super::fail;

pub fn run(template_dir: &str, charm_dir: &str, output: &GithubOutput) -> Result<Comparison, String> {
    let comparison = generate_and_compare(template_dir, charm_dir).map_err(fail)?;

    let generated_path = Path::new(template_dir).join(CONTRIBUTING_FILE);
    comparison.write_to(&generated_path).map_err(fail)?;

    if comparison.is_outdated() {
        println!("Contributing file does not exist or is outdated - a PR is needed.");
        println!("Proposed changes:");
        for line in &comparison.diff {
            println!("{}", line);
        }
    } else {
        println!("Contributing file is up to date. No need for a PR.");
    }
    output.set(OUTPUT_NAME, comparison.output_value()).map_err(fail)?;

    Ok(comparison)
}
