//! Row and column reshaping applied between merging and reporting.

use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::model::{Table, Value, month_of};

/// Keeps only `columns`, in the order given.
pub fn select(table: &Table, columns: &[&str]) -> Result<Table> {
    let indices = columns
        .iter()
        .map(|column| table.require_column(column))
        .collect::<Result<Vec<_>>>()?;
    let rows = table
        .rows()
        .map(|row| indices.iter().map(|&index| row[index].clone()).collect())
        .collect();
    Ok(Table::from_parts_unchecked(
        columns.iter().map(|column| column.to_string()).collect(),
        rows,
    ))
}

/// Removes `columns`; every named column must exist.
pub fn drop_columns(table: &Table, columns: &[&str]) -> Result<Table> {
    for column in columns {
        table.require_column(column)?;
    }
    let kept: Vec<&str> = table
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|column| !columns.contains(column))
        .collect();
    select(table, &kept)
}

/// Keeps the rows whose `column` equals `expected`, in their original order.
pub fn filter_eq(table: &Table, column: &str, expected: &Value) -> Result<Table> {
    let index = table.require_column(column)?;
    let rows = table
        .rows()
        .filter(|row| &row[index] == expected)
        .map(<[Value]>::to_vec)
        .collect();
    Ok(Table::from_parts_unchecked(table.columns().to_vec(), rows))
}

/// Adds (or replaces) `target` with the calendar month (1-12) of the dates in
/// `source`. Non-date cells yield `Null`.
pub fn derive_month(table: &Table, source: &str, target: &str) -> Result<Table> {
    derive(table, source, target, |value| match value {
        Value::Date(date) => Value::Number(f64::from(month_of(date))),
        _ => Value::Null,
    })
}

/// Adds (or replaces) `target` with `source × factor`. `Null` stays `Null`;
/// other non-numeric cells count as zero.
pub fn derive_scaled(table: &Table, source: &str, factor: f64, target: &str) -> Result<Table> {
    if !factor.is_finite() {
        return Err(ToolError::InvalidConfig(format!(
            "scale factor for '{target}' must be finite"
        )));
    }
    derive(table, source, target, |value| match value {
        Value::Null => Value::Null,
        other => Value::Number(other.number_or_zero() * factor),
    })
}

fn derive(
    table: &Table,
    source: &str,
    target: &str,
    compute: impl Fn(&Value) -> Value,
) -> Result<Table> {
    let source_index = table.require_column(source)?;
    let mut columns = table.columns().to_vec();
    let target_index = match table.column_index(target) {
        Some(index) => index,
        None => {
            columns.push(target.to_string());
            columns.len() - 1
        }
    };

    let rows = table
        .rows()
        .map(|row| {
            let derived = compute(&row[source_index]);
            let mut row = row.to_vec();
            if target_index == row.len() {
                row.push(derived);
            } else {
                row[target_index] = derived;
            }
            row
        })
        .collect();
    Ok(Table::from_parts_unchecked(columns, rows))
}
