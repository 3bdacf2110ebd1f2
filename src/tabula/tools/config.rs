//! JSON description of one pipeline run.
//!
//! ```json
//! {
//!   "sources": { "directory": "data", "prefix": "sales_", "extension": "xlsx" },
//!   "load": { "date_columns": ["date"] },
//!   "merge": { "origin_column": "source_file" },
//!   "transforms": [{ "kind": "month", "from": "date", "into": "month" }],
//!   "reports": [
//!     { "kind": "merged", "sheet": "merged", "sort": [{ "column": "month" }] },
//!     { "kind": "group_by", "sheet": "by month", "keys": ["month"],
//!       "metrics": [{ "column": "sales" }] }
//!   ],
//!   "output": "merged_sales.xlsx"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::tabula::tools::accumulate::TotalsOrder;
use crate::tabula::tools::aggregate::{AggregateOp, Metric, PivotFill};
use crate::tabula::tools::chart::ChartKind;
use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::io::discover::SourcePattern;
use crate::tabula::tools::load::LoadOptions;
use crate::tabula::tools::merge::{DEFAULT_ORIGIN_COLUMN, MergeOptions};
use crate::tabula::tools::sort::SortKey;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub sources: SourcesConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub transforms: Vec<TransformStep>,
    pub reports: Vec<ReportSpec>,
    pub output: PathBuf,
}

/// Where the sources come from: an explicit file list (merged in the order
/// given) or every matching file of a directory (merged by file name).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Worksheet to read from every workbook source.
    #[serde(default)]
    pub sheet: Option<String>,
}

impl SourcesConfig {
    pub fn files(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            directory: None,
            prefix: String::new(),
            extension: default_extension(),
            sheet: None,
        }
    }

    pub fn pattern(&self) -> SourcePattern {
        SourcePattern::new(self.prefix.clone(), self.extension.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    #[serde(default)]
    pub date_columns: Vec<String>,
    #[serde(default)]
    pub currency_columns: Vec<String>,
}

impl LoadConfig {
    pub fn options(&self) -> LoadOptions {
        LoadOptions::default()
            .with_date_columns(self.date_columns.iter().cloned())
            .with_currency_columns(self.currency_columns.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    #[serde(default = "default_origin_column")]
    pub origin_column: String,
    #[serde(default)]
    pub strict: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            origin_column: default_origin_column(),
            strict: false,
        }
    }
}

impl MergeConfig {
    pub fn options(&self) -> MergeOptions {
        MergeOptions::default()
            .with_origin_column(self.origin_column.clone())
            .strict(self.strict)
    }
}

/// Reshaping applied to the merged table before any report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformStep {
    Select { columns: Vec<String> },
    Drop { columns: Vec<String> },
    /// Keeps rows whose `column` equals `equals` (read as a number when it
    /// looks like one).
    Filter { column: String, equals: String },
    Month { from: String, into: String },
    Scale { from: String, factor: f64, into: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    pub column: String,
    #[serde(default)]
    pub op: AggregateOp,
    #[serde(default)]
    pub name: Option<String>,
}

impl MetricConfig {
    pub fn metric(&self) -> Metric {
        let metric = Metric::new(self.column.clone(), self.op);
        match &self.name {
            Some(name) => metric.named(name.clone()),
            None => metric,
        }
    }
}

/// Chart over two columns of a report sheet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub x_axis: String,
    #[serde(default)]
    pub y_axis: String,
    #[serde(default)]
    pub kind: ChartKind,
    /// Column holding the category labels.
    pub category: String,
    /// Column holding the plotted values.
    pub value: String,
}

/// One output sheet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSpec {
    /// The merged rows themselves.
    Merged {
        sheet: String,
        #[serde(default)]
        sort: Vec<SortKey>,
        #[serde(default)]
        chart: Option<ChartConfig>,
    },
    GroupBy {
        sheet: String,
        keys: Vec<String>,
        metrics: Vec<MetricConfig>,
        #[serde(default)]
        sort: Vec<SortKey>,
        #[serde(default)]
        chart: Option<ChartConfig>,
    },
    Pivot {
        sheet: String,
        rows: String,
        columns: String,
        metric: String,
        #[serde(default)]
        op: AggregateOp,
        #[serde(default)]
        fill: PivotFill,
        /// Order row and column keys ascending instead of first-seen.
        #[serde(default = "default_true")]
        sorted: bool,
        #[serde(default)]
        chart: Option<ChartConfig>,
    },
    Totals {
        sheet: String,
        category: String,
        amount: String,
        #[serde(default)]
        order: TotalsOrder,
        #[serde(default)]
        chart: Option<ChartConfig>,
    },
}

impl ReportSpec {
    pub fn sheet(&self) -> &str {
        match self {
            ReportSpec::Merged { sheet, .. }
            | ReportSpec::GroupBy { sheet, .. }
            | ReportSpec::Pivot { sheet, .. }
            | ReportSpec::Totals { sheet, .. } => sheet,
        }
    }

    pub fn chart(&self) -> Option<&ChartConfig> {
        match self {
            ReportSpec::Merged { chart, .. }
            | ReportSpec::GroupBy { chart, .. }
            | ReportSpec::Pivot { chart, .. }
            | ReportSpec::Totals { chart, .. } => chart.as_ref(),
        }
    }

    /// Header written when there is no source data to report on.
    pub fn empty_columns(&self, origin_column: &str) -> Vec<String> {
        match self {
            ReportSpec::Merged { .. } => vec![origin_column.to_string()],
            ReportSpec::GroupBy { keys, metrics, .. } => keys
                .iter()
                .cloned()
                .chain(metrics.iter().map(|metric| metric.metric().name))
                .collect(),
            ReportSpec::Pivot { rows, .. } => vec![rows.clone()],
            ReportSpec::Totals {
                category, amount, ..
            } => vec![category.clone(), amount.clone()],
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.files.is_empty() && self.sources.directory.is_none() {
            return Err(ToolError::InvalidConfig(
                "sources need either 'files' or 'directory'".into(),
            ));
        }
        if self.reports.is_empty() {
            return Err(ToolError::InvalidConfig(
                "at least one report is required".into(),
            ));
        }
        for report in &self.reports {
            if report.sheet().trim().is_empty() {
                return Err(ToolError::InvalidConfig(
                    "report sheet names must not be empty".into(),
                ));
            }
            if let ReportSpec::GroupBy { metrics, .. } = report {
                if metrics.is_empty() {
                    return Err(ToolError::InvalidConfig(format!(
                        "report '{}' has no metrics",
                        report.sheet()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn default_extension() -> String {
    "xlsx".to_string()
}

fn default_origin_column() -> String {
    DEFAULT_ORIGIN_COLUMN.to_string()
}

fn default_true() -> bool {
    true
}
