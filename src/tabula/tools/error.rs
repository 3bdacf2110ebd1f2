use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool loads, merges, aggregates, or writes tabular data.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the pipeline configuration is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the CSV reader.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// A source could not be located or opened.
    #[error("source unavailable: {location}: {reason}")]
    SourceUnavailable { location: String, reason: String },

    /// A source was opened but its content could not be decoded into rows.
    #[error("failed to parse {location}: {detail}")]
    ParseFailure { location: String, detail: String },

    /// Raised in strict merge mode when a column carries incompatible kinds
    /// of values in different sources.
    #[error("schema conflict on column '{column}': {kinds} across sources {sources:?}")]
    SchemaConflict {
        column: String,
        sources: Vec<String>,
        kinds: String,
    },

    /// Raised when a chart references cells outside the written sheet.
    #[error("invalid range {range}: written extent is {extent}")]
    InvalidRange { range: String, extent: String },

    /// Raised when the output workbook cannot be persisted.
    #[error("failed to write {}: {reason}", destination.display())]
    DestinationWriteFailure {
        destination: PathBuf,
        reason: String,
    },

    /// Raised when an operation names a column the table does not have.
    #[error("column '{column}' not found; available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// Raised when the number of origin labels does not match the tables.
    #[error("{tables} tables were supplied with {labels} origin labels")]
    OriginMismatch { tables: usize, labels: usize },

    /// Raised when a row does not match the width of its table.
    #[error("row has {found} values but the table has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    /// Raised when the pipeline configuration is semantically invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    pub(crate) fn missing_column(column: &str, available: &[String]) -> Self {
        ToolError::MissingColumn {
            column: column.to_string(),
            available: available.to_vec(),
        }
    }
}
