//! Bulk entry import from spreadsheets.

pub mod spreadsheet;

use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::runtime::entries::EntryStore;

pub use spreadsheet::{read_rows, rows_to_entries, ImportError, ImportReport, ImportRow, RejectedRow};

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub ids: Vec<Uuid>,
    pub rejected: Vec<RejectedRow>,
}

/// Read `path` without touching the store.
pub fn preview_file(path: &Path) -> Result<ImportReport, ImportError> {
    Ok(rows_to_entries(read_rows(path)?))
}

/// Read `path` and store every row that validates. Blocking; call from
/// `spawn_blocking` in async code.
pub fn import_file(store: &EntryStore, path: &Path) -> Result<ImportSummary, ImportError> {
    let report = preview_file(path)?;
    for r in &report.rejected {
        tracing::warn!(path = %path.display(), row = r.row, error = %r.error, "import row rejected");
    }
    let created = store.create_many(report.accepted);
    tracing::info!(
        path = %path.display(),
        imported = created.len(),
        rejected = report.rejected.len(),
        "spreadsheet imported"
    );
    Ok(ImportSummary {
        imported: created.len(),
        ids: created.iter().map(|e| e.id).collect(),
        rejected: report.rejected,
    })
}
