//! Spreadsheet reader: first worksheet, header row, one entry per row.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::runtime::entries::{validate, NewEntry, ValidatedEntry};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("cannot open workbook: {0}")]
    Open(String),
    #[error("workbook has no worksheets")]
    NoSheet,
    #[error("cannot read worksheet: {0}")]
    Sheet(String),
}

/// One data row keyed by normalized header. `row` is the 1-based
/// spreadsheet row number (the header is row 1).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRow {
    pub row: usize,
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedRow {
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub accepted: Vec<ValidatedEntry>,
    pub rejected: Vec<RejectedRow>,
}

/// Trim, lowercase, spaces to underscores.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Cell → JSON. Empty and error cells yield `None` so the field counts as
/// missing. Date cells become `YYYY-MM-DD`, or `HH:MM:SS` under a `time`
/// or `fire_time` header.
pub fn cell_value(header: &str, cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => dt.as_datetime().map(|d| {
            let fmt = match header {
                "time" | "fire_time" => "%H:%M:%S",
                _ => "%Y-%m-%d",
            };
            Value::String(d.format(fmt).to_string())
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

/// Read the first worksheet of an `.xlsx`, `.xls` or `.ods` file.
pub fn read_rows(path: &Path) -> Result<Vec<ImportRow>, ImportError> {
    if !path.exists() {
        return Err(ImportError::NotFound(path.display().to_string()));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| ImportError::Open(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoSheet)?
        .map_err(|e| ImportError::Sheet(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| match c {
            Data::Empty => String::new(),
            other => normalize_header(&other.to_string()),
        })
        .collect();

    // Rows are numbered from the range start so leading blank rows in the
    // sheet do not shift the reported numbers.
    let first_row = range.start().map_or(0, |(r, _)| r as usize);

    let mut out = Vec::new();
    for (i, row) in rows.enumerate() {
        let mut values = Map::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if header.is_empty() {
                continue;
            }
            if let Some(v) = cell_value(header, cell) {
                values.insert(header.clone(), v);
            }
        }
        if values.is_empty() {
            continue;
        }
        out.push(ImportRow {
            // +1 for the header, +1 for 1-based numbering.
            row: first_row + i + 2,
            values,
        });
    }
    Ok(out)
}

/// Validate every row. Rows that fail are reported, never stored.
pub fn rows_to_entries(rows: Vec<ImportRow>) -> ImportReport {
    let mut report = ImportReport::default();
    for ImportRow { row, values } in rows {
        let parsed = serde_json::from_value::<NewEntry>(Value::Object(values))
            .map_err(|e| format!("unreadable row: {e}"))
            .and_then(|n| validate(&n).map_err(|e| e.to_string()));
        match parsed {
            Ok(entry) => report.accepted.push(entry),
            Err(error) => report.rejected.push(RejectedRow { row, error }),
        }
    }
    report
}
