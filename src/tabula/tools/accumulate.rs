//! Single-pass running totals per category.
//!
//! Totals are kept as exact decimals, so adding many amounts never compounds
//! binary rounding error. Only reported totals are rounded, to two decimal
//! places with halves rounded away from zero. A total that leaves the decimal
//! range (about ±7.9e28) carries on in floating point instead of failing.

use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::tabula::tools::error::Result;
use crate::tabula::tools::model::{FirstSeen, Table, Value};

/// Decimal places of reported totals.
pub const REPORTED_SCALE: u32 = 2;

/// Presentation order of category totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsOrder {
    /// Order in which categories were first seen.
    #[default]
    FirstSeen,
    /// Largest total first; equal totals keep first-seen order.
    TotalDescending,
}

/// A running or reported total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Total {
    Exact(Decimal),
    /// Floating point total, used once a sum or an amount no longer fits a
    /// decimal.
    Approximate(f64),
}

impl Total {
    pub const ZERO: Total = Total::Exact(Decimal::ZERO);

    /// The decimal value, when the total is still exact.
    pub fn exact(self) -> Option<Decimal> {
        match self {
            Total::Exact(total) => Some(total),
            Total::Approximate(_) => None,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Total::Exact(total) => total.to_f64().unwrap_or(f64::NAN),
            Total::Approximate(total) => total,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, Total::Exact(_))
    }

    fn plus(self, amount: Total) -> Total {
        match (self, amount) {
            (Total::Exact(lhs), Total::Exact(rhs)) => match lhs.checked_add(rhs) {
                Some(sum) => Total::Exact(sum),
                None => Total::Approximate(self.to_f64() + amount.to_f64()),
            },
            _ => Total::Approximate(self.to_f64() + amount.to_f64()),
        }
    }

    fn reported(self) -> Total {
        match self {
            Total::Exact(total) => Total::Exact(round_reported(total)),
            approximate => approximate,
        }
    }

    fn descending(lhs: &Total, rhs: &Total) -> Ordering {
        match (lhs, rhs) {
            (Total::Exact(lhs), Total::Exact(rhs)) => rhs.cmp(lhs),
            _ => rhs.to_f64().total_cmp(&lhs.to_f64()),
        }
    }
}

/// Running totals keyed by category.
///
/// Every category starts at zero (the identity) and each accepted row adds
/// its amount. Rows without a category are ignored.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    categories: FirstSeen<Value>,
    totals: Vec<Total>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to `category`. `Null` and empty-text categories are
    /// skipped; amounts without a numeric reading count as zero.
    pub fn add(&mut self, category: Value, amount: &Value) {
        if is_blank_category(&category) {
            return;
        }
        let (slot, opened) = self.categories.slot(category);
        if opened {
            self.totals.push(Total::ZERO);
        }
        let previous = self.totals[slot];
        let next = previous.plus(amount_of(amount));
        if previous.is_exact() && !next.is_exact() {
            warn!(
                category = %self.categories.keys()[slot],
                "total exceeds the decimal range; continuing in floating point"
            );
        }
        self.totals[slot] = next;
    }

    pub fn finish(self) -> CategoryTotals {
        CategoryTotals {
            category_label: "category".to_string(),
            total_label: "total".to_string(),
            entries: self.categories.into_keys().into_iter().zip(self.totals).collect(),
        }
    }
}

/// Totals per category, in first-seen order unless reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotals {
    category_label: String,
    total_label: String,
    entries: Vec<(Value, Total)>,
}

impl CategoryTotals {
    /// Sets the column headers used by [`CategoryTotals::to_table`].
    pub fn with_labels(mut self, category: impl Into<String>, total: impl Into<String>) -> Self {
        self.category_label = category.into();
        self.total_label = total.into();
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reported total of `category`. Exact totals are rounded.
    pub fn total(&self, category: &Value) -> Option<Total> {
        self.raw_total(category).map(Total::reported)
    }

    /// Unrounded running total of `category`.
    pub fn raw_total(&self, category: &Value) -> Option<Total> {
        self.entries
            .iter()
            .find(|(key, _)| key == category)
            .map(|(_, total)| *total)
    }

    /// Categories with their reported totals, in the current order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, Total)> + '_ {
        self.entries
            .iter()
            .map(|(key, total)| (key, total.reported()))
    }

    pub fn categories(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Returns a copy in the requested presentation order.
    pub fn ordered(&self, order: TotalsOrder) -> Self {
        let mut entries = self.entries.clone();
        if order == TotalsOrder::TotalDescending {
            entries.sort_by(|(_, lhs), (_, rhs)| Total::descending(lhs, rhs));
        }
        Self {
            category_label: self.category_label.clone(),
            total_label: self.total_label.clone(),
            entries,
        }
    }

    /// Two-column table of categories and reported totals.
    pub fn to_table(&self) -> Table {
        let rows = self
            .iter()
            .map(|(key, total)| {
                let total = total.to_f64();
                let total = if total.is_finite() {
                    Value::Number(total)
                } else {
                    Value::Null
                };
                vec![key.clone(), total]
            })
            .collect();
        Table::from_parts_unchecked(
            vec![self.category_label.clone(), self.total_label.clone()],
            rows,
        )
    }
}

/// Accumulates `(category, amount)` pairs in one pass.
pub fn accumulate<I>(rows: I) -> CategoryTotals
where
    I: IntoIterator<Item = (Value, Value)>,
{
    let mut accumulator = Accumulator::new();
    for (category, amount) in rows {
        accumulator.add(category, &amount);
    }
    accumulator.finish()
}

/// Accumulates two columns of `table`; the column names become the headers
/// of the resulting totals.
pub fn accumulate_table(
    table: &Table,
    category_column: &str,
    amount_column: &str,
) -> Result<CategoryTotals> {
    let category_index = table.require_column(category_column)?;
    let amount_index = table.require_column(amount_column)?;
    let totals = accumulate(
        table
            .rows()
            .map(|row| (row[category_index].clone(), row[amount_index].clone())),
    );
    debug!(categories = totals.len(), "category totals accumulated");
    Ok(totals.with_labels(category_column, amount_column))
}

fn is_blank_category(category: &Value) -> bool {
    match category {
        Value::Null => true,
        Value::Text(text) => text.is_empty(),
        Value::Number(_) | Value::Date(_) => false,
    }
}

fn amount_of(amount: &Value) -> Total {
    match amount {
        // The shortest decimal text of an f64 is the amount as it was written.
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .ok()
            .or_else(|| Decimal::from_f64(*number))
            .map(Total::Exact)
            .unwrap_or_else(|| approximate(*number)),
        Value::Text(text) => match Decimal::from_str(text.trim()) {
            Ok(exact) => Total::Exact(exact),
            Err(_) => match amount.as_number() {
                Some(number) => Decimal::from_f64(number)
                    .map(Total::Exact)
                    .unwrap_or_else(|| approximate(number)),
                None => Total::ZERO,
            },
        },
        Value::Date(_) | Value::Null => Total::ZERO,
    }
}

fn approximate(number: f64) -> Total {
    if number.is_finite() {
        Total::Approximate(number)
    } else {
        Total::ZERO
    }
}

fn round_reported(total: Decimal) -> Decimal {
    total.round_dp_with_strategy(REPORTED_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
