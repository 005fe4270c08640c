//! Locate charm directories in a repository checkout.
//!
//! A directory is a charm if it holds `metadata.yaml`, `metadata.yml` or
//! `charmcraft.yaml`. Charms nested under `<base>/<charms_subdir>/*` take
//! precedence; only when there are none is `<base>` itself considered.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::OpsError;

pub const DEFAULT_CHARMS_SUBDIR: &str = "charms";
pub const OUTPUT_NAME: &str = "charm_paths";

const CHARM_MARKERS: &[&str] = &["metadata.yaml", "metadata.yml", "charmcraft.yaml"];

/// Sorted, de-duplicated charm directories under `base_dir`.
pub fn find_charms_in_dir(base_dir: impl AsRef<Path>, charms_subdir: &str) -> Result<Vec<PathBuf>, OpsError> {
    let base_dir = base_dir.as_ref();
    let nested = base_dir.join(charms_subdir).join("*");

    let mut found = charm_dirs_matching(&nested)?;
    if found.is_empty() {
        found = charm_dirs_matching(base_dir)?;
    }

    tracing::debug!("[CharmPaths] {} charm(s) under {}", found.len(), base_dir.display());
    Ok(found.into_iter().collect())
}

/// Parents of every marker file found directly inside directories matching `dir_pattern`.
fn charm_dirs_matching(dir_pattern: &Path) -> Result<BTreeSet<PathBuf>, OpsError> {
    let escaped = glob::Pattern::escape(&dir_pattern.to_string_lossy());
    // The trailing `*` of a nested search is a wildcard, not a literal.
    let dir_glob = match escaped.strip_suffix("[*]") {
        Some(prefix) => format!("{}*", prefix),
        None => escaped,
    };

    let mut dirs = BTreeSet::new();
    for marker in CHARM_MARKERS {
        let pattern = format!("{}/{}", dir_glob.trim_end_matches('/'), marker);
        let paths = glob::glob(&pattern)
            .map_err(|e| OpsError::Validation(format!("Invalid search pattern '{}': {}", pattern, e)))?;
        for entry in paths.flatten() {
            if let Some(parent) = entry.parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }
    Ok(dirs)
}

/// Render each path with a trailing slash, dropping any leading `./`.
///
/// A path that is only `.` stays `./`.
pub fn stringify_paths(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            let raw = p.display().to_string();
            let mut rel = raw.trim_end_matches('/');
            while let Some(rest) = rel.strip_prefix("./") {
                rel = rest.trim_start_matches('/');
            }
            if rel.is_empty() || rel == "." {
                "./".to_string()
            } else {
                format!("{}/", rel)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "name: test\n").unwrap();
    }

    #[test]
    fn test_single_charm_repo() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("metadata.yaml"));
        let found = find_charms_in_dir(dir.path(), DEFAULT_CHARMS_SUBDIR).unwrap();
        assert_eq!(found, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_nested_charms_win_over_base() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("charmcraft.yaml"));
        touch(&dir.path().join("charms/charm1/metadata.yml"));
        let found = find_charms_in_dir(dir.path(), DEFAULT_CHARMS_SUBDIR).unwrap();
        assert_eq!(found, vec![dir.path().join("charms/charm1")]);
    }

    #[test]
    fn test_multi_charm_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("charms/charm1/metadata.yaml"));
        touch(&dir.path().join("charms/charm1/charmcraft.yaml"));
        touch(&dir.path().join("charms/charm0/charmcraft.yaml"));
        let found = find_charms_in_dir(dir.path(), DEFAULT_CHARMS_SUBDIR).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("charms/charm0"), dir.path().join("charms/charm1")]
        );
    }

    #[test]
    fn test_charms_outside_subdir_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("operators/charm0/metadata.yaml"));
        fs::create_dir_all(dir.path().join("charms/empty")).unwrap();
        assert!(find_charms_in_dir(dir.path(), DEFAULT_CHARMS_SUBDIR).unwrap().is_empty());
        assert_eq!(
            find_charms_in_dir(dir.path(), "operators").unwrap(),
            vec![dir.path().join("operators/charm0")]
        );
    }

    #[test]
    fn test_stringify_adds_trailing_slash() {
        let paths = vec![PathBuf::from("charms/a"), PathBuf::from("repo/"), PathBuf::from("/abs/x")];
        assert_eq!(stringify_paths(&paths), vec!["charms/a/", "repo/", "/abs/x/"]);
    }

    #[test]
    fn test_stringify_drops_leading_dot_slash() {
        let paths = vec![
            PathBuf::from("./charms/a"),
            PathBuf::from(".//charms/b/"),
            PathBuf::from("."),
            PathBuf::from("./"),
        ];
        assert_eq!(stringify_paths(&paths), vec!["charms/a/", "charms/b/", "./", "./"]);
    }

    #[test]
    fn test_default_base_joins_to_relative_output() {
        let nested = vec![PathBuf::from("./").join("charms").join("charm1")];
        assert_eq!(stringify_paths(&nested), vec!["charms/charm1/"]);
    }
}
