//! `email-scheduler import <path>`: dry-run a spreadsheet import.

use std::path::Path;

use anyhow::Context;

use crate::import::preview_file;

/// Validate every row and print the report. Returns `false` when any row
/// was rejected.
pub fn run(path: &Path) -> anyhow::Result<bool> {
    let report = preview_file(path).with_context(|| format!("importing {}", path.display()))?;
    let json = serde_json::to_string_pretty(&report).context("serializing import report")?;
    println!("{json}");
    eprintln!(
        "{} row(s) accepted, {} rejected",
        report.accepted.len(),
        report.rejected.len()
    );
    Ok(report.rejected.is_empty())
}
