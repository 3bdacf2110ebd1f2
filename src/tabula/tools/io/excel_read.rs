use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::debug;

use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::io::{RawCell, RawRow, RawSheet, fallback_column_name};

/// Reads one worksheet of an `.xlsx` workbook. The first row is the header;
/// rows that are entirely empty are skipped.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<RawSheet> {
    let location = path.display().to_string();
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|err: calamine::XlsxError| ToolError::SourceUnavailable {
            location: location.clone(),
            reason: err.to_string(),
        })?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook.sheet_names().first().cloned().ok_or_else(|| {
            ToolError::ParseFailure {
                location: location.clone(),
                detail: "workbook contains no worksheets".into(),
            }
        })?,
    };

    let range = read_required_sheet(&mut workbook, &sheet_name, &location)?;
    let raw = range_to_raw_sheet(&range, location);
    debug!(
        sheet = %sheet_name,
        columns = raw.columns.len(),
        rows = raw.rows.len(),
        "worksheet read"
    );
    Ok(raw)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
    location: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::ParseFailure {
            location: location.to_string(),
            detail: format!("missing sheet '{name}'"),
        })?;
    let range = range_result.map_err(|err| ToolError::ParseFailure {
        location: location.to_string(),
        detail: err.to_string(),
    })?;
    Ok(range)
}

fn range_to_raw_sheet(range: &calamine::Range<DataType>, source: String) -> RawSheet {
    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                let name = cell_to_raw(cell).to_string();
                let name = name.trim();
                if name.is_empty() {
                    fallback_column_name(index)
                } else {
                    name.to_string()
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let mut raw_rows: Vec<RawRow> = Vec::new();
    for row in rows {
        if row.iter().all(|cell| matches!(cell, DataType::Empty)) {
            continue;
        }
        let raw_row = row
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                let column = columns
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| fallback_column_name(index));
                (column, cell_to_raw(cell))
            })
            .collect();
        raw_rows.push(raw_row);
    }

    RawSheet {
        source,
        columns,
        rows: raw_rows,
    }
}

fn cell_to_raw(cell: &DataType) -> RawCell {
    match cell {
        DataType::String(value) => RawCell::Text(value.clone()),
        DataType::Float(value) => RawCell::Number(*value),
        DataType::Int(value) => RawCell::Number(*value as f64),
        DataType::Bool(value) => RawCell::Bool(*value),
        DataType::DateTime(value) => RawCell::DateSerial(*value),
        DataType::Empty => RawCell::Empty,
        other => RawCell::Text(other.to_string()),
    }
}
