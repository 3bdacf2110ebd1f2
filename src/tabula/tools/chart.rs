use std::fmt;

use serde::Deserialize;

use crate::tabula::tools::error::{Result, ToolError};

/// Rectangular block of cells in sheet coordinates. Rows and columns are
/// zero-based and inclusive; row 0 is the header row of a written sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl CellRange {
    pub fn new(first_row: u32, first_col: u16, last_row: u32, last_col: u16) -> Self {
        Self {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    /// Cells `first_row..=last_row` of one column.
    pub fn column(col: u16, first_row: u32, last_row: u32) -> Self {
        Self::new(first_row, col, last_row, col)
    }

    /// Cells `first_col..=last_col` of one row.
    pub fn row(row: u32, first_col: u16, last_col: u16) -> Self {
        Self::new(row, first_col, row, last_col)
    }

    pub fn height(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    pub fn width(&self) -> u16 {
        self.last_col - self.first_col + 1
    }

    /// Whether the range is a single row or a single column.
    pub fn is_line(&self) -> bool {
        self.height() == 1 || self.width() == 1
    }

    /// Number of cells along the range's axis.
    pub fn len(&self) -> usize {
        (self.height() as usize).max(self.width() as usize)
    }

    /// Whether the whole range lies inside `rows` × `cols` cells starting at A1.
    pub fn fits_within(&self, rows: u32, cols: u16) -> bool {
        self.last_row < rows && self.last_col < cols
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_letters(self.first_col),
            self.first_row + 1,
            column_letters(self.last_col),
            self.last_row + 1
        )
    }
}

/// Spreadsheet column name for a zero-based index (`0` → `A`, `26` → `AA`).
pub fn column_letters(index: u16) -> String {
    let mut remaining = u32::from(index) + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        let offset = ((remaining - 1) % 26) as u8;
        letters.push(char::from(b'A' + offset));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Chart flavour requested from the chart consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Column,
    Bar,
    Line,
    Pie,
}

/// Description of a chart over ranges of a written sheet. Nothing here
/// renders; the spreadsheet application draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    pub kind: ChartKind,
    pub values: CellRange,
    pub categories: CellRange,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, values: CellRange, categories: CellRange) -> Self {
        Self {
            title: title.into(),
            x_axis: String::new(),
            y_axis: String::new(),
            kind: ChartKind::default(),
            values,
            categories,
        }
    }

    /// Chart plotting `value_col` against `category_col` over the first
    /// `data_rows` rows below the header.
    pub fn for_columns(
        title: impl Into<String>,
        category_col: u16,
        value_col: u16,
        data_rows: usize,
    ) -> Self {
        let last_row = u32::try_from(data_rows).unwrap_or(u32::MAX).max(1);
        Self::new(
            title,
            CellRange::column(value_col, 1, last_row),
            CellRange::column(category_col, 1, last_row),
        )
    }

    pub fn with_axes(mut self, x_axis: impl Into<String>, y_axis: impl Into<String>) -> Self {
        self.x_axis = x_axis.into();
        self.y_axis = y_axis.into();
        self
    }

    pub fn with_kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }

    /// Checks that both ranges are contiguous lines of equal length.
    pub fn validate(&self) -> Result<()> {
        for range in [&self.values, &self.categories] {
            if !range.is_line() {
                return Err(ToolError::InvalidRange {
                    range: range.to_string(),
                    extent: "a single row or column".into(),
                });
            }
        }
        if self.values.len() != self.categories.len() {
            return Err(ToolError::InvalidRange {
                range: format!("{} (values)", self.values),
                extent: format!(
                    "{} cells to match categories {}",
                    self.categories.len(),
                    self.categories
                ),
            });
        }
        Ok(())
    }

    /// Checks that both ranges fall inside a written block of `rows` × `cols`
    /// cells (header row included).
    pub fn check_extent(&self, rows: u32, cols: u16) -> Result<()> {
        self.validate()?;
        let extent = if rows == 0 || cols == 0 {
            "empty sheet".to_string()
        } else {
            CellRange::new(0, 0, rows - 1, cols - 1).to_string()
        };
        for range in [&self.values, &self.categories] {
            if !range.fits_within(rows, cols) {
                return Err(ToolError::InvalidRange {
                    range: range.to_string(),
                    extent,
                });
            }
        }
        Ok(())
    }
}
