use std::collections::HashMap;
use std::hash::Hash;

use crate::tabula::tools::error::{Result, ToolError};

mod value;

pub use value::{
    Value, ValueKind, datetime_to_excel_serial, excel_serial_to_datetime, parse_date_text,
};
pub(crate) use value::{month_of, parse_finite};

/// Ordered tuple of values identifying one aggregation bucket.
pub type GroupKey = Vec<Value>;

/// A rectangular table of [`Value`]s sharing one ordered schema.
///
/// Every row holds exactly one value per column, in schema order. Missing
/// source fields are stored as [`Value::Null`]. A row's position is its
/// index in the table, so positions are always dense and start at zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given schema.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from rows aligned to `columns`.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Builds a table from ordered `(column, value)` records. The schema is
    /// the union of all column names in first-appearance order; records
    /// lacking a column get `Null` there.
    pub fn from_records<I, R>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (String, Value)>,
    {
        Self::from_records_with_columns(Vec::new(), records)
    }

    /// Like [`Table::from_records`], but the schema starts with `columns`
    /// (typically a header row) before any names discovered in the records.
    pub fn from_records_with_columns<I, R>(columns: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (String, Value)>,
    {
        let mut schema: FirstSeen<String> = FirstSeen::default();
        for column in columns {
            schema.slot(column);
        }
        let mut sparse: Vec<Vec<(usize, Value)>> = Vec::new();
        for record in records {
            let cells = record
                .into_iter()
                .map(|(column, value)| (schema.slot(column).0, value))
                .collect();
            sparse.push(cells);
        }

        let width = schema.len();
        let rows = sparse
            .into_iter()
            .map(|cells| {
                let mut row = vec![Value::Null; width];
                for (index, value) in cells {
                    row[index] = value;
                }
                row
            })
            .collect();

        Self {
            columns: schema.into_keys(),
            rows,
        }
    }

    /// Appends a row, rejecting rows whose width differs from the schema.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ToolError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `column` in the schema.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Like [`Table::column_index`] but reports a missing column as an error.
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| ToolError::missing_column(column, &self.columns))
    }

    /// Iterates over the raw rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn row(&self, position: usize) -> Option<&[Value]> {
        self.rows.get(position).map(Vec::as_slice)
    }

    /// Iterates over the rows as column-aware records.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn record(&self, position: usize) -> Option<Record<'_>> {
        self.rows.get(position).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// Value at `position` in `column`, if both exist.
    pub fn value(&self, position: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(position)?.get(index)
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>> {
        let index = self.require_column(column)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    pub(crate) fn from_parts_unchecked(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(
            rows.iter().all(|row| row.len() == columns.len()),
            "rows must match the schema width"
        );
        Self { columns, rows }
    }
}

/// Borrowed view of one table row as an ordered column → value mapping.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.values.get(index)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Iterates over `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Insertion-ordered key index: assigns each distinct key a dense slot in
/// the order keys are first seen.
#[derive(Debug, Clone)]
pub(crate) struct FirstSeen<K> {
    keys: Vec<K>,
    index: HashMap<K, usize>,
}

impl<K> Default for FirstSeen<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> FirstSeen<K> {
    /// Returns the slot of `key` and whether it was newly opened.
    pub(crate) fn slot(&mut self, key: K) -> (usize, bool) {
        if let Some(&slot) = self.index.get(&key) {
            return (slot, false);
        }
        let slot = self.keys.len();
        self.index.insert(key.clone(), slot);
        self.keys.push(key);
        (slot, true)
    }

    pub(crate) fn get(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn into_keys(self) -> Vec<K> {
        self.keys
    }
}
