pub mod cache;
pub mod delimited;
pub mod workbook;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tagging_core::Table;

pub use cache::TableCache;
pub use delimited::DelimitedFileSource;
pub use workbook::WorkbookSource;

/// Where a table lives: a file, plus a sheet name for workbooks or a
/// delimiter override for text files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl SourceLocation {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            sheet: None,
            delimiter: None,
        }
    }

    pub fn sheet<P: Into<PathBuf>>(path: P, sheet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet: Some(sheet.into()),
            delimiter: None,
        }
    }

    pub(crate) fn resolve_against(&mut self, base: &Path) {
        if self.path.is_relative() {
            self.path = base.join(&self.path);
        }
    }

    fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}#{}", self.path.display(), sheet),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("{path} contains no sheets")]
    NoSheets { path: PathBuf },
    #[error("sheet '{sheet}' not found in {path} (available: {available:?})")]
    MissingSheet {
        path: PathBuf,
        sheet: String,
        available: Vec<String>,
    },
    #[error("failed to read {location}: {reason}")]
    Read { location: String, reason: String },
    #[error("unsupported source format for {path}")]
    UnsupportedFormat { path: PathBuf },
}

/// Supplies raw tables for the engine.
pub trait TableSource: Send + Sync {
    fn load(&self, location: &SourceLocation) -> Result<Table, LoadError>;
}

/// Picks the workbook or delimited-text reader by file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const TEXT_EXTENSIONS: &[&str] = &["csv", "dat", "tsv", "txt"];

impl TableSource for FileSource {
    fn load(&self, location: &SourceLocation) -> Result<Table, LoadError> {
        let ext = location.extension();
        let started = std::time::Instant::now();

        let result = if location.delimiter.is_some() || TEXT_EXTENSIONS.contains(&ext.as_str()) {
            DelimitedFileSource.load(location)
        } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            WorkbookSource.load(location)
        } else {
            Err(LoadError::UnsupportedFormat {
                path: location.path.clone(),
            })
        };

        match &result {
            Ok(table) => {
                metrics::histogram!("source_load_seconds").record(started.elapsed().as_secs_f64());
                tracing::debug!(%location, rows = table.len(), columns = table.columns.len(), "source table loaded");
            }
            Err(e) => {
                metrics::counter!("source_load_errors_total").increment(1);
                tracing::warn!(%location, error = %e, "source table load failed");
            }
        }
        result
    }
}

/// Header text for a column; blank headers get positional names.
pub(crate) fn header_name(raw: &str, idx: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Unnamed: {idx}")
    } else {
        trimmed.to_string()
    }
}
