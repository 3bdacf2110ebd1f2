//! Turns tables and aggregate results into sheets ready for the destination
//! adapter. Rows are emitted exactly in the order received.

use std::collections::HashSet;
use std::path::Path;

use tracing::instrument;

use crate::tabula::tools::accumulate::CategoryTotals;
use crate::tabula::tools::aggregate::{AggregateResult, PivotResult};
use crate::tabula::tools::chart::ChartSpec;
use crate::tabula::tools::error::Result;
use crate::tabula::tools::io::excel_write;
use crate::tabula::tools::model::{Table, Value};

/// Longest sheet name a workbook accepts.
const MAX_SHEET_NAME: usize = 31;

/// One sheet to be written: a header row, data rows and an optional chart.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub chart: Option<ChartSpec>,
}

impl SheetData {
    pub fn from_table(name: impl Into<String>, table: &Table) -> Self {
        Self {
            name: name.into(),
            columns: table.columns().to_vec(),
            rows: table.rows().map(<[Value]>::to_vec).collect(),
            chart: None,
        }
    }

    pub fn with_chart(mut self, chart: Option<ChartSpec>) -> Self {
        self.chart = chart;
        self
    }

    /// Rows occupied once written, header included.
    pub fn written_rows(&self) -> u32 {
        u32::try_from(self.rows.len() + 1).unwrap_or(u32::MAX)
    }

    pub fn written_cols(&self) -> u16 {
        u16::try_from(self.columns.len()).unwrap_or(u16::MAX)
    }

    /// Checks the attached chart against the cells this sheet will occupy.
    pub fn validate(&self) -> Result<()> {
        match &self.chart {
            Some(chart) => chart.check_extent(self.written_rows(), self.written_cols()),
            None => Ok(()),
        }
    }
}

/// Anything that can be laid out as a sheet.
pub trait IntoSheet {
    fn to_sheet(&self, name: &str) -> SheetData;
}

impl IntoSheet for Table {
    fn to_sheet(&self, name: &str) -> SheetData {
        SheetData::from_table(name, self)
    }
}

impl IntoSheet for AggregateResult {
    fn to_sheet(&self, name: &str) -> SheetData {
        SheetData::from_table(name, &self.to_table())
    }
}

impl IntoSheet for PivotResult {
    fn to_sheet(&self, name: &str) -> SheetData {
        SheetData::from_table(name, &self.to_table())
    }
}

impl IntoSheet for CategoryTotals {
    fn to_sheet(&self, name: &str) -> SheetData {
        SheetData::from_table(name, &self.to_table())
    }
}

/// All sheets of one output workbook, with unique, valid sheet names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkbookData {
    sheets: Vec<SheetData>,
    names: SheetNameRegistry,
}

impl WorkbookData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet, renaming it when its name is invalid or already taken.
    pub fn push(&mut self, mut sheet: SheetData) {
        sheet.name = self.names.assign(&sheet.name);
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[SheetData] {
        &self.sheets
    }

    /// Validates every sheet before anything touches the destination.
    pub fn validate(&self) -> Result<()> {
        self.sheets.iter().try_for_each(SheetData::validate)
    }
}

/// Writes a single table or result to `destination`, optionally with a chart.
#[instrument(
    level = "info",
    skip_all,
    fields(sheet = %sheet_name, destination = %destination.display())
)]
pub fn write<T: IntoSheet + ?Sized>(
    result: &T,
    sheet_name: &str,
    destination: &Path,
    chart: Option<ChartSpec>,
) -> Result<()> {
    let mut workbook = WorkbookData::new();
    workbook.push(result.to_sheet(sheet_name).with_chart(chart));
    write_workbook(destination, &workbook)
}

/// Validates and writes a whole workbook.
pub fn write_workbook(destination: &Path, workbook: &WorkbookData) -> Result<()> {
    workbook.validate()?;
    excel_write::write_workbook(destination, workbook)
}

#[derive(Debug, Clone, PartialEq, Default)]
struct SheetNameRegistry {
    used: HashSet<String>,
}

impl SheetNameRegistry {
    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        if self.claim(&base) {
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            let prefix = truncate_chars(&base, MAX_SHEET_NAME - suffix.chars().count());
            let candidate = format!("{prefix}{suffix}");
            if self.claim(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Sheet names compare case-insensitively inside a workbook.
    fn claim(&mut self, name: &str) -> bool {
        self.used.insert(name.to_lowercase())
    }
}

fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']'];
    let sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let sanitized = sanitized.trim().trim_matches('\'');
    if sanitized.is_empty() {
        return "Sheet".to_string();
    }
    truncate_chars(sanitized, MAX_SHEET_NAME)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
