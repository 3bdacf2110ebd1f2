//! Coercion of raw source rows into typed tables.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use crate::tabula::tools::io::{RawCell, RawSheet};
use crate::tabula::tools::model::{
    Table, Value, excel_serial_to_datetime, parse_date_text, parse_finite,
};

/// Prefixes stripped from monetary text before parsing. `Â` is the artifact
/// left when a UTF-8 `£` is decoded as Latin-1.
const CURRENCY_MARKS: [&str; 7] = ["Â", "$", "£", "€", "¥", "￥", "₩"];

/// Per-column coercion hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Columns whose text cells are dates.
    pub date_columns: HashSet<String>,
    /// Columns whose text cells are amounts that may carry currency marks.
    pub currency_columns: HashSet<String>,
}

impl LoadOptions {
    pub fn with_date_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_currency_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.currency_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }
}

/// A cell that could not be coerced to its declared type. The cell was
/// loaded as `Null` and the row kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub source: String,
    /// Zero-based data row (the header is not counted).
    pub row: usize,
    pub column: String,
    pub raw: String,
    pub reason: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row {} column '{}': {} ('{}')",
            self.source, self.row, self.column, self.reason, self.raw
        )
    }
}

/// Result of loading one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub table: Table,
    pub warnings: Vec<LoadWarning>,
}

/// Turns one raw sheet into a typed table.
///
/// The schema is the header followed by any further column names seen in
/// the rows, in first-appearance order; missing cells are `Null`.
pub fn load(raw: &RawSheet, options: &LoadOptions) -> Loaded {
    let mut warnings = Vec::new();

    let records = raw.rows.iter().enumerate().map(|(row_idx, row)| {
        row.iter()
            .map(|(column, cell)| {
                let value = match coerce_cell(column, cell, options) {
                    Ok(value) => value,
                    Err(reason) => {
                        let warning = LoadWarning {
                            source: raw.source.clone(),
                            row: row_idx,
                            column: column.clone(),
                            raw: cell.to_string(),
                            reason,
                        };
                        warn!(%warning, "cell could not be coerced");
                        warnings.push(warning);
                        Value::Null
                    }
                };
                (column.clone(), value)
            })
            .collect::<Vec<_>>()
    });

    let table = Table::from_records_with_columns(raw.columns.clone(), records);

    debug!(
        source = %raw.source,
        rows = table.row_count(),
        columns = table.columns().len(),
        warnings = warnings.len(),
        "source loaded"
    );
    Loaded { table, warnings }
}

const UNDECODABLE: &str = "not valid UTF-8 text";

fn coerce_cell(column: &str, cell: &RawCell, options: &LoadOptions) -> Result<Value, String> {
    if options.date_columns.contains(column) {
        return coerce_date(cell);
    }
    if options.currency_columns.contains(column) {
        return coerce_currency(cell);
    }
    Ok(match cell {
        RawCell::Text(text) => Value::infer(text),
        RawCell::Number(number) => Value::Number(*number),
        RawCell::DateSerial(serial) => excel_serial_to_datetime(*serial)
            .map(Value::Date)
            .ok_or_else(|| format!("date serial {serial} is out of range"))?,
        RawCell::Bool(flag) => Value::Text(flag.to_string()),
        RawCell::Empty => Value::Null,
        RawCell::Undecodable(_) => return Err(UNDECODABLE.to_string()),
    })
}

fn coerce_date(cell: &RawCell) -> Result<Value, String> {
    match cell {
        RawCell::Empty => Ok(Value::Null),
        RawCell::Text(text) if text.trim().is_empty() => Ok(Value::Null),
        RawCell::Text(text) => parse_date_text(text)
            .map(Value::Date)
            .ok_or_else(|| "not a recognised date".to_string()),
        RawCell::Number(serial) | RawCell::DateSerial(serial) => excel_serial_to_datetime(*serial)
            .map(Value::Date)
            .ok_or_else(|| format!("date serial {serial} is out of range")),
        RawCell::Bool(_) => Err("expected a date, found a boolean".to_string()),
        RawCell::Undecodable(_) => Err(UNDECODABLE.to_string()),
    }
}

fn coerce_currency(cell: &RawCell) -> Result<Value, String> {
    match cell {
        RawCell::Empty => Ok(Value::Null),
        RawCell::Number(number) => Ok(Value::Number(*number)),
        RawCell::Text(text) if text.trim().is_empty() => Ok(Value::Null),
        RawCell::Text(text) => parse_amount(text)
            .map(Value::Number)
            .ok_or_else(|| "not a recognised amount".to_string()),
        RawCell::DateSerial(_) | RawCell::Bool(_) => {
            Err("expected an amount".to_string())
        }
        RawCell::Undecodable(_) => Err(UNDECODABLE.to_string()),
    }
}

/// Parses monetary text such as `Â£51.77`, `$1,200` or `-¥300`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let mut remaining = text.trim();
    let negative = remaining.starts_with('-');
    if negative {
        remaining = remaining[1..].trim_start();
    }
    loop {
        let stripped = CURRENCY_MARKS
            .iter()
            .find_map(|mark| remaining.strip_prefix(mark));
        match stripped {
            Some(rest) => remaining = rest.trim_start(),
            None => break,
        }
    }
    let digits: String = remaining.chars().filter(|ch| *ch != ',').collect();
    let amount = parse_finite(digits.trim())?;
    Some(if negative { -amount } else { amount })
}
