use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::io::{RawCell, RawRow, RawSheet, fallback_column_name};

/// Reads a comma separated file with a header row. Every field is delivered
/// as text; empty fields become [`RawCell::Empty`] and fields that are not
/// valid UTF-8 become [`RawCell::Undecodable`]. Short rows simply lack the
/// trailing columns, long rows get generated column names.
pub fn read_csv(path: &Path) -> Result<RawSheet> {
    let location = path.display().to_string();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| ToolError::SourceUnavailable {
            location: location.clone(),
            reason: err.to_string(),
        })?;

    let columns: Vec<String> = reader
        .byte_headers()
        .map_err(|err| parse_failure(&location, &err))?
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let name = String::from_utf8_lossy(name);
            let name = name.trim().trim_start_matches('\u{feff}');
            if name.is_empty() {
                fallback_column_name(index)
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut rows: Vec<RawRow> = Vec::new();
    let mut undecodable = 0usize;
    for record in reader.byte_records() {
        let record = record.map_err(|err| parse_failure(&location, &err))?;
        let row: RawRow = record
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let column = columns
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| fallback_column_name(index));
                (column, raw_field(field))
            })
            .collect();
        if row.iter().all(|(_, cell)| *cell == RawCell::Empty) {
            continue;
        }
        undecodable += row
            .iter()
            .filter(|(_, cell)| matches!(cell, RawCell::Undecodable(_)))
            .count();
        rows.push(row);
    }

    debug!(
        columns = columns.len(),
        rows = rows.len(),
        undecodable,
        "CSV read"
    );
    Ok(RawSheet {
        source: location,
        columns,
        rows,
    })
}

fn raw_field(field: &[u8]) -> RawCell {
    match std::str::from_utf8(field) {
        Ok(text) if text.trim().is_empty() => RawCell::Empty,
        Ok(text) => RawCell::Text(text.to_string()),
        Err(_) => RawCell::Undecodable(String::from_utf8_lossy(field).into_owned()),
    }
}

fn parse_failure(location: &str, err: &csv::Error) -> ToolError {
    let detail = match err.position() {
        Some(position) => format!("line {}: {err}", position.line()),
        None => err.to_string(),
    };
    ToolError::ParseFailure {
        location: location.to_string(),
        detail,
    }
}
