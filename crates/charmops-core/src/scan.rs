//! Summaries of Trivy vulnerability scan reports.
//!
//! Each JSON report becomes one CSV line:
//! `artifact,base,osC,osH,osM,osL,langC,langH,langM,langL`

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{self, OpsError};

pub const CSV_HEADER: &str = "artifact,base,os-critical,os-high,os-medium,os-low,lang-critical,lang-high,lang-medium,lang-low";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Report {
    artifact_name: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    results: Option<Vec<ScanResult>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Metadata {
    #[serde(default, rename = "OS")]
    os: Option<OsInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OsInfo {
    family: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanResult {
    #[serde(default)]
    class: String,
    #[serde(default)]
    vulnerabilities: Option<Vec<Vulnerability>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Vulnerability {
    #[serde(default)]
    severity: String,
}

/// Vulnerability counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub unknown: u32,
}

impl SeverityCounts {
    fn record(&mut self, severity: &str) {
        match severity.to_ascii_uppercase().as_str() {
            "CRITICAL" => self.critical += 1,
            "HIGH" => self.high += 1,
            "MEDIUM" => self.medium += 1,
            "LOW" => self.low += 1,
            _ => self.unknown += 1,
        }
    }
}

/// Summary of one scanned artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub artifact: String,
    /// `<family>:<name>` of the base OS, or `N/A`
    pub base: String,
    pub os_pkgs: SeverityCounts,
    pub lang_pkgs: SeverityCounts,
}

impl ScanSummary {
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.artifact,
            self.base,
            self.os_pkgs.critical,
            self.os_pkgs.high,
            self.os_pkgs.medium,
            self.os_pkgs.low,
            self.lang_pkgs.critical,
            self.lang_pkgs.high,
            self.lang_pkgs.medium,
            self.lang_pkgs.low
        )
    }
}

/// Summarise a report. `None` when the report has no `Results` section.
pub fn summarize_report(json: &str) -> Result<Option<ScanSummary>, OpsError> {
    let report: Report = serde_json::from_str(json)?;

    let Some(results) = report.results else {
        return Ok(None);
    };

    let base = report
        .metadata
        .os
        .map(|os| format!("{}:{}", os.family, os.name))
        .unwrap_or_else(|| "N/A".to_string());

    let mut summary = ScanSummary {
        artifact: report.artifact_name,
        base,
        os_pkgs: SeverityCounts::default(),
        lang_pkgs: SeverityCounts::default(),
    };

    for result in results {
        let counts = match result.class.as_str() {
            "os-pkgs" => &mut summary.os_pkgs,
            "lang-pkgs" => &mut summary.lang_pkgs,
            _ => continue,
        };
        for vuln in result.vulnerabilities.unwrap_or_default() {
            counts.record(&vuln.severity);
        }
    }

    Ok(Some(summary))
}

/// The `.json` reports at `path`: the file itself, or a directory's files sorted by name.
pub fn report_files(path: impl AsRef<Path>) -> Result<Vec<PathBuf>, OpsError> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(OpsError::Config(format!("Invalid input {} supplied", path.display())));
    }

    let entries = std::fs::read_dir(path).map_err(|e| OpsError::io(path, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Summarise every report at `path`, skipping reports without results.
pub fn summarize_path(path: impl AsRef<Path>) -> Result<Vec<ScanSummary>, OpsError> {
    let mut summaries = Vec::new();
    for file in report_files(path)? {
        match summarize_report(&error::read_to_string(&file)?)? {
            Some(summary) => summaries.push(summary),
            None => tracing::info!("[Scan] No results in report {}", file.display()),
        }
    }
    Ok(summaries)
}
