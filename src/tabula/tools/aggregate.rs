//! Grouped reductions and two-dimensional pivots over a [`Table`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::model::{FirstSeen, GroupKey, Table, Value};
use crate::tabula::tools::sort::{SortKey, SortRow, resolve_keys, stable_sort};

/// Reduction applied to the metric values of each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    #[default]
    Sum,
    Mean,
    Max,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateOp::Sum => write!(f, "sum"),
            AggregateOp::Mean => write!(f, "mean"),
            AggregateOp::Max => write!(f, "max"),
            AggregateOp::Count => write!(f, "count"),
        }
    }
}

/// One output metric: a source column reduced with an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub column: String,
    pub op: AggregateOp,
    /// Output column name; the source column name by default.
    pub name: String,
}

impl Metric {
    pub fn new(column: impl Into<String>, op: AggregateOp) -> Self {
        let column = column.into();
        Self {
            name: column.clone(),
            column,
            op,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Running state of one reduction.
///
/// Metric cells are read as numbers with `Null` and non-numeric text counted
/// as `0`; every row is one observation for `Mean` and `Count`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Reducer {
    Sum(f64),
    Mean { sum: f64, count: u64 },
    Max(f64),
    Count(u64),
}

impl Reducer {
    fn identity(op: AggregateOp) -> Self {
        match op {
            AggregateOp::Sum => Reducer::Sum(0.0),
            AggregateOp::Mean => Reducer::Mean { sum: 0.0, count: 0 },
            AggregateOp::Max => Reducer::Max(f64::NEG_INFINITY),
            AggregateOp::Count => Reducer::Count(0),
        }
    }

    fn update(&mut self, value: &Value) {
        match self {
            Reducer::Sum(sum) => *sum += value.number_or_zero(),
            Reducer::Mean { sum, count } => {
                *sum += value.number_or_zero();
                *count += 1;
            }
            Reducer::Max(max) => *max = max.max(value.number_or_zero()),
            Reducer::Count(count) => *count += 1,
        }
    }

    fn finish(&self) -> Value {
        match *self {
            Reducer::Sum(sum) => Value::Number(sum),
            Reducer::Mean { count: 0, .. } => Value::Null,
            Reducer::Mean { sum, count } => Value::Number(sum / count as f64),
            Reducer::Max(max) if max == f64::NEG_INFINITY => Value::Null,
            Reducer::Max(max) => Value::Number(max),
            Reducer::Count(count) => Value::Number(count as f64),
        }
    }
}

/// One group of an [`AggregateResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateEntry {
    pub key: GroupKey,
    /// Reduced values, aligned to [`AggregateResult::metric_names`].
    pub values: Vec<Value>,
}

impl SortRow for AggregateEntry {
    fn sort_value(&self, column: usize) -> &Value {
        if column < self.key.len() {
            &self.key[column]
        } else {
            &self.values[column - self.key.len()]
        }
    }
}

/// Groups in first-seen key order (unless sorted), each with its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    key_columns: Vec<String>,
    metric_names: Vec<String>,
    entries: Vec<AggregateEntry>,
}

impl AggregateResult {
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    /// Key columns followed by metric names.
    pub fn columns(&self) -> Vec<String> {
        self.key_columns
            .iter()
            .chain(&self.metric_names)
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[AggregateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &[Value]) -> Option<&AggregateEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Reduced value of `metric` for the group `key`.
    pub fn value(&self, key: &[Value], metric: &str) -> Option<&Value> {
        let index = self.metric_names.iter().position(|name| name == metric)?;
        self.get(key)?.values.get(index)
    }

    /// Returns a copy with entries stably ordered by `keys`, which may name
    /// key columns or metrics.
    pub fn sorted_by(&self, keys: &[SortKey]) -> Result<Self> {
        let resolved = resolve_keys(&self.columns(), keys)?;
        let mut entries = self.entries.clone();
        stable_sort(&mut entries, &resolved);
        Ok(Self {
            key_columns: self.key_columns.clone(),
            metric_names: self.metric_names.clone(),
            entries,
        })
    }

    /// One row per group: key values followed by metric values.
    pub fn to_table(&self) -> Table {
        let rows = self
            .entries
            .iter()
            .map(|entry| {
                entry
                    .key
                    .iter()
                    .chain(&entry.values)
                    .cloned()
                    .collect()
            })
            .collect();
        Table::from_parts_unchecked(self.columns(), rows)
    }
}

/// Groups `table` by `key_columns` and reduces `metric_column` with `op`.
pub fn group_reduce(
    table: &Table,
    key_columns: &[&str],
    metric_column: &str,
    op: AggregateOp,
) -> Result<AggregateResult> {
    group_reduce_many(table, key_columns, &[Metric::new(metric_column, op)])
}

/// Groups `table` by `key_columns` and computes every metric in one scan.
#[instrument(level = "debug", skip(table, metrics), fields(rows = table.row_count()))]
pub fn group_reduce_many(
    table: &Table,
    key_columns: &[&str],
    metrics: &[Metric],
) -> Result<AggregateResult> {
    if metrics.is_empty() {
        return Err(ToolError::InvalidConfig(
            "at least one metric is required".into(),
        ));
    }
    let mut names = HashSet::new();
    if let Some(duplicate) = metrics.iter().find(|metric| !names.insert(&metric.name)) {
        return Err(ToolError::InvalidConfig(format!(
            "metric name '{}' is used twice",
            duplicate.name
        )));
    }

    let key_indices = key_columns
        .iter()
        .map(|column| table.require_column(column))
        .collect::<Result<Vec<_>>>()?;
    let metric_indices = metrics
        .iter()
        .map(|metric| table.require_column(&metric.column))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: FirstSeen<GroupKey> = FirstSeen::default();
    let mut reducers: Vec<Vec<Reducer>> = Vec::new();
    for row in table.rows() {
        let key: GroupKey = key_indices.iter().map(|&index| row[index].clone()).collect();
        let (slot, opened) = groups.slot(key);
        if opened {
            reducers.push(
                metrics
                    .iter()
                    .map(|metric| Reducer::identity(metric.op))
                    .collect(),
            );
        }
        for (reducer, &index) in reducers[slot].iter_mut().zip(&metric_indices) {
            reducer.update(&row[index]);
        }
    }

    let entries: Vec<AggregateEntry> = groups
        .into_keys()
        .into_iter()
        .zip(reducers)
        .map(|(key, reducers)| AggregateEntry {
            key,
            values: reducers.iter().map(Reducer::finish).collect(),
        })
        .collect();
    debug!(groups = entries.len(), "table grouped");

    Ok(AggregateResult {
        key_columns: key_columns.iter().map(|column| column.to_string()).collect(),
        metric_names: metrics.iter().map(|metric| metric.name.clone()).collect(),
        entries,
    })
}

/// Value placed in pivot cells whose row/column pair never occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotFill {
    /// `0`, so row and column sums are unaffected.
    #[default]
    Zero,
    /// `Null`, written as a blank cell.
    Empty,
}

impl PivotFill {
    pub fn value(self) -> Value {
        match self {
            PivotFill::Zero => Value::Number(0.0),
            PivotFill::Empty => Value::Null,
        }
    }
}

/// Matrix of reduced values over observed row keys × observed column keys.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotResult {
    row_column: String,
    col_column: String,
    row_keys: Vec<Value>,
    col_keys: Vec<Value>,
    cells: Vec<Vec<Value>>,
    observed: Vec<Vec<bool>>,
    fill: PivotFill,
}

impl PivotResult {
    pub fn row_keys(&self) -> &[Value] {
        &self.row_keys
    }

    pub fn col_keys(&self) -> &[Value] {
        &self.col_keys
    }

    pub fn fill(&self) -> PivotFill {
        self.fill
    }

    /// Cell for the pair `(row, col)`, if both keys were observed.
    pub fn cell(&self, row: &Value, col: &Value) -> Option<&Value> {
        let (row, col) = self.position(row, col)?;
        Some(&self.cells[row][col])
    }

    /// Whether any source row had this `(row, col)` pair.
    pub fn is_observed(&self, row: &Value, col: &Value) -> bool {
        self.position(row, col)
            .is_some_and(|(row, col)| self.observed[row][col])
    }

    /// Returns a copy with row keys and column keys in ascending order.
    pub fn sorted(&self) -> Self {
        let row_order = ascending_order(&self.row_keys);
        let col_order = ascending_order(&self.col_keys);
        let permute = |matrix: &Vec<Vec<Value>>| -> Vec<Vec<Value>> {
            row_order
                .iter()
                .map(|&row| col_order.iter().map(|&col| matrix[row][col].clone()).collect())
                .collect()
        };
        Self {
            row_column: self.row_column.clone(),
            col_column: self.col_column.clone(),
            row_keys: row_order.iter().map(|&row| self.row_keys[row].clone()).collect(),
            col_keys: col_order.iter().map(|&col| self.col_keys[col].clone()).collect(),
            cells: permute(&self.cells),
            observed: row_order
                .iter()
                .map(|&row| col_order.iter().map(|&col| self.observed[row][col]).collect())
                .collect(),
            fill: self.fill,
        }
    }

    /// First column holds the row keys; one further column per column key,
    /// headed by the key's text. Headers that would repeat an earlier one
    /// (ignoring case) get a `_2`, `_3`, ... suffix.
    pub fn to_table(&self) -> Table {
        let mut columns = Vec::with_capacity(self.col_keys.len() + 1);
        let mut taken = HashSet::new();
        taken.insert(self.row_column.to_lowercase());
        columns.push(self.row_column.clone());
        for key in &self.col_keys {
            let header = match key {
                Value::Null => format!("{} (blank)", self.col_column),
                other => other.to_string(),
            };
            columns.push(unique_header(header, &mut taken));
        }

        let rows = self
            .row_keys
            .iter()
            .zip(&self.cells)
            .map(|(key, cells)| std::iter::once(key).chain(cells).cloned().collect())
            .collect();
        Table::from_parts_unchecked(columns, rows)
    }

    fn position(&self, row: &Value, col: &Value) -> Option<(usize, usize)> {
        let row = self.row_keys.iter().position(|key| key == row)?;
        let col = self.col_keys.iter().position(|key| key == col)?;
        Some((row, col))
    }
}

fn unique_header(header: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(header.to_lowercase()) {
        return header;
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{header}_{counter}");
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Reduces `metric_column` over every `(row_column, col_column)` pair.
#[instrument(level = "debug", skip(table), fields(rows = table.row_count()))]
pub fn pivot(
    table: &Table,
    row_column: &str,
    col_column: &str,
    metric_column: &str,
    op: AggregateOp,
    fill: PivotFill,
) -> Result<PivotResult> {
    let row_index = table.require_column(row_column)?;
    let col_index = table.require_column(col_column)?;
    let metric_index = table.require_column(metric_column)?;

    let mut row_keys: FirstSeen<Value> = FirstSeen::default();
    let mut col_keys: FirstSeen<Value> = FirstSeen::default();
    let mut reducers: HashMap<(usize, usize), Reducer> = HashMap::new();
    for row in table.rows() {
        let (row_slot, _) = row_keys.slot(row[row_index].clone());
        let (col_slot, _) = col_keys.slot(row[col_index].clone());
        reducers
            .entry((row_slot, col_slot))
            .or_insert_with(|| Reducer::identity(op))
            .update(&row[metric_index]);
    }

    let mut cells = Vec::with_capacity(row_keys.len());
    let mut observed = Vec::with_capacity(row_keys.len());
    for row_slot in 0..row_keys.len() {
        let mut cell_row = Vec::with_capacity(col_keys.len());
        let mut observed_row = Vec::with_capacity(col_keys.len());
        for col_slot in 0..col_keys.len() {
            match reducers.get(&(row_slot, col_slot)) {
                Some(reducer) => {
                    cell_row.push(reducer.finish());
                    observed_row.push(true);
                }
                None => {
                    cell_row.push(fill.value());
                    observed_row.push(false);
                }
            }
        }
        cells.push(cell_row);
        observed.push(observed_row);
    }

    debug!(
        rows = row_keys.len(),
        columns = col_keys.len(),
        "pivot built"
    );
    Ok(PivotResult {
        row_column: row_column.to_string(),
        col_column: col_column.to_string(),
        row_keys: row_keys.into_keys(),
        col_keys: col_keys.into_keys(),
        cells,
        observed,
        fill,
    })
}

fn ascending_order(keys: &[Value]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&lhs, &rhs| keys[lhs].sort_cmp(&keys[rhs]));
    order
}
