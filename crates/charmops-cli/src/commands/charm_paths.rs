//! `charmops charm-paths`: emit the charm directories of a repository.

use charmops_core::charm_paths::{find_charms_in_dir, stringify_paths, OUTPUT_NAME};
use charmops_core::GithubOutput;

use super::fail;

pub fn run(base_dir: &str, charms_subdir: &str, output: &GithubOutput) -> Result<Vec<String>, String> {
    let dirs = find_charms_in_dir(base_dir, charms_subdir).map_err(fail)?;
    let paths = stringify_paths(&dirs);

    let value = serde_json::to_string(&paths).map_err(fail)?;
    println!("Found {}: {}", OUTPUT_NAME, value);
    output.set(OUTPUT_NAME, &value).map_err(fail)?;
    Ok(paths)
}
