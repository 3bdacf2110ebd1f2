//! Adapters between files on disk and the in-memory tabular model.
//!
//! Readers return a [`RawSheet`]: header names plus rows of raw scalars,
//! before any type coercion. The [`load`](crate::load) stage turns those into
//! typed [`Table`](crate::model::Table)s.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::tabula::tools::error::{Result, ToolError};

pub mod csv_read;
pub mod discover;
pub mod excel_read;
pub mod excel_write;

/// A scalar as delivered by a source adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Number(f64),
    /// Spreadsheet date serial (days since 1899-12-30).
    DateSerial(f64),
    Bool(bool),
    Empty,
    /// Field bytes that are not valid UTF-8, kept in lossy form for warnings.
    Undecodable(String),
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Text(value) | RawCell::Undecodable(value) => f.write_str(value),
            RawCell::Number(value) | RawCell::DateSerial(value) => write!(f, "{value}"),
            RawCell::Bool(value) => write!(f, "{value}"),
            RawCell::Empty => Ok(()),
        }
    }
}

/// One raw row: ordered `(column, cell)` pairs.
pub type RawRow = Vec<(String, RawCell)>;

/// Rows read from one source, before coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSheet {
    /// Identifier of the source, used in warnings and errors.
    pub source: String,
    /// Column names taken from the header row.
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Container format of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Csv,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Xlsx => write!(f, "xlsx"),
            SourceFormat::Csv => write!(f, "csv"),
        }
    }
}

/// A source file plus the hints needed to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub format: Option<SourceFormat>,
    /// Worksheet to read; the first sheet when absent. Ignored for CSV.
    pub sheet: Option<String>,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            sheet: None,
        }
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    /// Label used to tag rows from this source after a merge: the file name.
    pub fn origin_label(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Guesses the container format from the file extension.
pub fn detect_format(path: &Path) -> Option<SourceFormat> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "xlsx" | "xlsm" => Some(SourceFormat::Xlsx),
        "csv" | "txt" => Some(SourceFormat::Csv),
        _ => None,
    }
}

/// Reads one source through the adapter matching its format.
pub fn read_source(location: &SourceLocation) -> Result<RawSheet> {
    let format = location
        .format
        .or_else(|| detect_format(&location.path))
        .ok_or_else(|| ToolError::SourceUnavailable {
            location: location.path.display().to_string(),
            reason: "unable to infer the source format from the file extension".into(),
        })?;

    if !location.path.is_file() {
        return Err(ToolError::SourceUnavailable {
            location: location.path.display().to_string(),
            reason: "file does not exist".into(),
        });
    }

    match format {
        SourceFormat::Xlsx => excel_read::read_sheet(&location.path, location.sheet.as_deref()),
        SourceFormat::Csv => csv_read::read_csv(&location.path),
    }
}

/// Header name for an unnamed column at zero-based `index`.
pub(crate) fn fallback_column_name(index: usize) -> String {
    format!("column_{}", index + 1)
}
