use std::collections::{BTreeSet, HashSet};

use tracing::{info, instrument, warn};

use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::model::{FirstSeen, Table, Value, ValueKind};

/// Column added by [`merge`] when no other name is configured.
pub const DEFAULT_ORIGIN_COLUMN: &str = "origin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Name of the column recording which source contributed each row.
    pub origin_column: String,
    /// Reject columns whose value kinds differ between sources instead of
    /// converting them to text.
    pub strict: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            origin_column: DEFAULT_ORIGIN_COLUMN.to_string(),
            strict: false,
        }
    }
}

impl MergeOptions {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_origin_column(mut self, column: impl Into<String>) -> Self {
        self.origin_column = column.into();
        self
    }
}

/// A column whose value kinds disagree between sources.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KindConflict {
    column: String,
    sources: Vec<String>,
    kinds: BTreeSet<ValueKind>,
}

/// Concatenates `tables` in order, tagging every row with its table's label.
///
/// The merged schema is the ordered union of the input schemas followed by
/// the origin column; columns a table lacks are `Null` in its rows.
#[instrument(level = "debug", skip_all, fields(tables = tables.len()))]
pub fn merge(tables: Vec<Table>, origin_labels: &[String], options: &MergeOptions) -> Result<Table> {
    if tables.len() != origin_labels.len() {
        return Err(ToolError::OriginMismatch {
            tables: tables.len(),
            labels: origin_labels.len(),
        });
    }

    let mut schema: FirstSeen<String> = FirstSeen::default();
    for (table, label) in tables.iter().zip(origin_labels) {
        for column in table.columns() {
            if column == &options.origin_column {
                warn!(
                    source = %label,
                    column = %column,
                    "source already has the origin column; it will be overwritten"
                );
                continue;
            }
            schema.slot(column.clone());
        }
    }

    let conflicts = find_conflicts(&tables, origin_labels, schema.keys());
    if let Some(conflict) = conflicts.first() {
        if options.strict {
            return Err(ToolError::SchemaConflict {
                column: conflict.column.clone(),
                sources: conflict.sources.clone(),
                kinds: describe_kinds(&conflict.kinds),
            });
        }
    }
    for conflict in &conflicts {
        warn!(
            column = %conflict.column,
            kinds = %describe_kinds(&conflict.kinds),
            "column kinds differ between sources; converting to text"
        );
    }
    let text_columns: HashSet<&str> = conflicts
        .iter()
        .map(|conflict| conflict.column.as_str())
        .collect();

    let width = schema.len();
    let total_rows = tables.iter().map(Table::row_count).sum();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(total_rows);

    for (table, label) in tables.into_iter().zip(origin_labels) {
        let (columns, table_rows) = table.into_parts();
        // Target slot and text coercion flag per source column; `None` drops
        // a stale origin column.
        let targets: Vec<Option<(usize, bool)>> = columns
            .iter()
            .map(|column| {
                schema
                    .get(column)
                    .map(|slot| (slot, text_columns.contains(column.as_str())))
            })
            .collect();

        for row in table_rows {
            let mut merged = vec![Value::Null; width + 1];
            for (value, target) in row.into_iter().zip(&targets) {
                if let Some((slot, as_text)) = *target {
                    merged[slot] = if as_text { to_text(value) } else { value };
                }
            }
            merged[width] = Value::Text(label.clone());
            rows.push(merged);
        }
    }

    let mut columns = schema.into_keys();
    columns.push(options.origin_column.clone());
    info!(
        rows = rows.len(),
        columns = columns.len(),
        "tables merged"
    );
    Ok(Table::from_parts_unchecked(columns, rows))
}

fn find_conflicts(tables: &[Table], labels: &[String], columns: &[String]) -> Vec<KindConflict> {
    let mut conflicts = Vec::new();
    for column in columns {
        let mut per_source: Vec<(&String, BTreeSet<ValueKind>)> = Vec::new();
        for (table, label) in tables.iter().zip(labels) {
            let Some(index) = table.column_index(column) else {
                continue;
            };
            let kinds: BTreeSet<ValueKind> =
                table.rows().filter_map(|row| row[index].kind()).collect();
            if !kinds.is_empty() {
                per_source.push((label, kinds));
            }
        }

        let distinct: BTreeSet<&BTreeSet<ValueKind>> =
            per_source.iter().map(|(_, kinds)| kinds).collect();
        if distinct.len() > 1 {
            conflicts.push(KindConflict {
                column: column.clone(),
                sources: per_source.iter().map(|(label, _)| (*label).clone()).collect(),
                kinds: per_source
                    .iter()
                    .flat_map(|(_, kinds)| kinds.iter().copied())
                    .collect(),
            });
        }
    }
    conflicts
}

fn describe_kinds(kinds: &BTreeSet<ValueKind>) -> String {
    kinds
        .iter()
        .map(ValueKind::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

fn to_text(value: Value) -> Value {
    match value {
        Value::Null | Value::Text(_) => value,
        other => Value::Text(other.to_string()),
    }
}
