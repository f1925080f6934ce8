use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bulk import of entries from a spreadsheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Spreadsheet imported once when the server boots.
    #[serde(default)]
    pub on_startup: Option<PathBuf>,
}
