//! CONTRIBUTING.md generation from a shared template.
//!
//! `contributing.md.template` holds `{{ key }}` placeholders filled from the
//! charm's `contributing_inputs.yaml`. The result is diffed against the
//! charm's current `contributing.md` to decide whether a PR is needed.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::error::{self, OpsError};

pub const TEMPLATE_FILE: &str = "contributing.md.template";
pub const INPUTS_FILE: &str = "contributing_inputs.yaml";
pub const CONTRIBUTING_FILE: &str = "contributing.md";
pub const OUTPUT_NAME: &str = "comparison_result";

/// One line of a line diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Same(String),
    Removed(String),
    Added(String),
}

impl std::fmt::Display for DiffLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffLine::Same(l) => write!(f, "  {}", l),
            DiffLine::Removed(l) => write!(f, "- {}", l),
            DiffLine::Added(l) => write!(f, "+ {}", l),
        }
    }
}

/// The rendered file and how it differs from the existing one.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub generated: String,
    pub diff: Vec<DiffLine>,
}

impl Comparison {
    pub fn is_outdated(&self) -> bool {
        self.diff.iter().any(|l| !matches!(l, DiffLine::Same(_)))
    }

    /// Write the rendered file to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), OpsError> {
        error::write_string(path, &self.generated)
    }

    /// `1` when a PR is needed, else `0`.
    pub fn output_value(&self) -> &'static str {
        if self.is_outdated() {
            "1"
        } else {
            "0"
        }
    }
}

/// Replace every `{{ key }}` with its input value and reject leftovers.
pub fn render_template(template: &str, inputs: &BTreeMap<String, String>) -> Result<String, OpsError> {
    let mut rendered = template.to_string();
    for (key, value) in inputs {
        tracing::debug!("[Contributing] Replacing {} with {}", key, value);
        rendered = rendered.replace(&format!("{{{{ {} }}}}", key), value);
    }

    let residue = Regex::new(r"\{\{[^}]*\}\}")
        .map_err(|e| OpsError::Validation(e.to_string()))?;
    let leftovers: Vec<String> = residue
        .find_iter(&rendered)
        .map(|m| m.as_str().to_string())
        .collect();
    if !leftovers.is_empty() {
        return Err(OpsError::Placeholders(leftovers));
    }
    Ok(rendered)
}

/// Parse the inputs file; scalar values of any type are used as text.
pub fn parse_inputs(yaml: &str) -> Result<BTreeMap<String, String>, OpsError> {
    let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml)?;
    raw.into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                other => {
                    return Err(OpsError::Validation(format!(
                        "Input '{}' must be a scalar, got {:?}",
                        key, other
                    )))
                }
            };
            Ok((key, text))
        })
        .collect()
}

/// Line diff of `old` → `new` based on their longest common subsequence.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffLine> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(DiffLine::Same(a[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(DiffLine::Removed(a[i].to_string()));
            i += 1;
        } else {
            out.push(DiffLine::Added(b[j].to_string()));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|l| DiffLine::Removed(l.to_string())));
    out.extend(b[j..].iter().map(|l| DiffLine::Added(l.to_string())));
    out
}

/// Render the template for a charm and compare it with its current file.
pub fn generate_and_compare(template_dir: impl AsRef<Path>, charm_dir: impl AsRef<Path>) -> Result<Comparison, OpsError> {
    let template_dir = template_dir.as_ref();
    let charm_dir = charm_dir.as_ref();

    let template = error::read_to_string(template_dir.join(TEMPLATE_FILE))?;
    let inputs = parse_inputs(&error::read_to_string(charm_dir.join(INPUTS_FILE))?)?;
    let generated = render_template(&template, &inputs)?;
    tracing::info!("[Contributing] Generated contributing file from template");

    let existing_path = charm_dir.join(CONTRIBUTING_FILE);
    let existing = if existing_path.exists() {
        tracing::info!("[Contributing] Existing contributing file found");
        error::read_to_string(&existing_path)?
    } else {
        tracing::info!("[Contributing] No existing contributing file found");
        String::new()
    };

    let diff = diff_lines(&existing, &generated);
    Ok(Comparison { generated, diff })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_render_replaces_placeholders() {
        let out = render_template(
            "# Contributing to {{ charm_name }}\nRun `tox -e {{ test_env }}`.",
            &inputs(&[("charm_name", "test-charm"), ("test_env", "unit")]),
        )
        .unwrap();
        assert_eq!(out, "# Contributing to test-charm\nRun `tox -e unit`.");
    }

    #[test]
    fn test_render_reports_leftovers() {
        let err = render_template("{{ a }} {{ missing }} {{other}}", &inputs(&[("a", "x")])).unwrap_err();
        match err {
            OpsError::Placeholders(left) => assert_eq!(left, vec!["{{ missing }}", "{{other}}"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_inputs_stringifies_scalars() {
        let parsed = parse_inputs("charm_name: test-charm\nversion: 2\nbeta: true\n").unwrap();
        assert_eq!(parsed["version"], "2");
        assert_eq!(parsed["beta"], "true");
        assert!(parse_inputs("list: [1, 2]\n").is_err());
    }

    #[test]
    fn test_diff_lines() {
        let diff = diff_lines("a\nb\nc\n", "a\nx\nc\nd\n");
        let rendered: Vec<String> = diff.iter().map(|l| l.to_string()).collect();
        assert_eq!(rendered, vec!["  a", "- b", "+ x", "  c", "+ d"]);
        assert!(diff_lines("same\n", "same\n").iter().all(|l| matches!(l, DiffLine::Same(_))));
    }

    #[test]
    fn test_generate_and_compare_roundtrip() {
        let templates = tempfile::tempdir().unwrap();
        let charm = tempfile::tempdir().unwrap();
        std::fs::write(
            templates.path().join(TEMPLATE_FILE),
            "# Contributing\n\nTo build {{ charm_name }} run:\n",
        )
        .unwrap();
        std::fs::write(charm.path().join(INPUTS_FILE), "charm_name: test-charm\n").unwrap();

        let missing = generate_and_compare(templates.path(), charm.path()).unwrap();
        assert!(missing.is_outdated());
        assert_eq!(missing.output_value(), "1");
        assert!(missing.diff.iter().all(|l| matches!(l, DiffLine::Added(_))));

        std::fs::write(charm.path().join(CONTRIBUTING_FILE), &missing.generated).unwrap();
        let current = generate_and_compare(templates.path(), charm.path()).unwrap();
        assert!(!current.is_outdated());
        assert_eq!(current.output_value(), "0");
    }

    #[test]
    fn test_write_to_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let comparison = Comparison {
            generated: "# Contributing\n".to_string(),
            diff: diff_lines("", "# Contributing\n"),
        };

        let target = dir.path().join(CONTRIBUTING_FILE);
        comparison.write_to(&target).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Contributing\n");

        let err = comparison
            .write_to(dir.path().join("no-such-dir").join(CONTRIBUTING_FILE))
            .unwrap_err();
        assert!(matches!(err, OpsError::Io { .. }));
        assert!(err.to_string().contains("no-such-dir"));
    }
}
