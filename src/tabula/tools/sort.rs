use std::cmp::Ordering;

use serde::Deserialize;

use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::model::{Table, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One level of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Descending,
        }
    }
}

/// A sort key bound to a column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedKey {
    column: usize,
    direction: Direction,
}

/// Something whose cells can be compared by column position.
pub(crate) trait SortRow {
    fn sort_value(&self, column: usize) -> &Value;
}

impl SortRow for Vec<Value> {
    fn sort_value(&self, column: usize) -> &Value {
        &self[column]
    }
}

pub(crate) fn resolve_keys(columns: &[String], keys: &[SortKey]) -> Result<Vec<ResolvedKey>> {
    keys.iter()
        .map(|key| {
            columns
                .iter()
                .position(|column| column == &key.column)
                .map(|column| ResolvedKey {
                    column,
                    direction: key.direction,
                })
                .ok_or_else(|| ToolError::missing_column(&key.column, columns))
        })
        .collect()
}

/// Stable lexicographic sort. `Null` is smallest, so it leads ascending
/// columns and trails descending ones.
pub(crate) fn stable_sort<R: SortRow>(rows: &mut [R], keys: &[ResolvedKey]) {
    rows.sort_by(|lhs, rhs| compare_rows(lhs, rhs, keys));
}

fn compare_rows<R: SortRow>(lhs: &R, rhs: &R, keys: &[ResolvedKey]) -> Ordering {
    for key in keys {
        let ordering = lhs
            .sort_value(key.column)
            .sort_cmp(rhs.sort_value(key.column));
        let ordering = match key.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Returns a copy of `table` with rows stably ordered by `keys`.
pub fn sort_by(table: &Table, keys: &[SortKey]) -> Result<Table> {
    let resolved = resolve_keys(table.columns(), keys)?;
    let mut rows: Vec<Vec<Value>> = table.rows().map(<[Value]>::to_vec).collect();
    stable_sort(&mut rows, &resolved);
    Ok(Table::from_parts_unchecked(table.columns().to_vec(), rows))
}
