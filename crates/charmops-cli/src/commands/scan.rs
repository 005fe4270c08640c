//! `charmops scan-summary`: one CSV line per Trivy report.

use charmops_core::scan::{summarize_path, CSV_HEADER};

use super::fail;

pub fn run(report_path: &str, header: bool) -> Result<(), String> {
    let summaries = summarize_path(report_path).map_err(fail)?;
    if header {
        println!("{}", CSV_HEADER);
    }
    for summary in &summaries {
        println!("{}", summary.to_csv());
    }
    Ok(())
}
