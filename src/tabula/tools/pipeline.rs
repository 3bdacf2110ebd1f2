use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::tabula::tools::accumulate::accumulate_table;
use crate::tabula::tools::aggregate::{Metric, group_reduce_many, pivot};
use crate::tabula::tools::chart::ChartSpec;
use crate::tabula::tools::config::{ChartConfig, PipelineConfig, ReportSpec, TransformStep};
use crate::tabula::tools::error::{Result, ToolError};
use crate::tabula::tools::io::discover::discover_sources;
use crate::tabula::tools::io::{self, SourceLocation};
use crate::tabula::tools::load::{LoadOptions, LoadWarning, load};
use crate::tabula::tools::merge::{MergeOptions, merge};
use crate::tabula::tools::model::{Table, Value};
use crate::tabula::tools::sort::sort_by;
use crate::tabula::tools::transform;
use crate::tabula::tools::write::{self, SheetData, WorkbookData};

/// A problem the pipeline recovered from.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    /// Discovery matched nothing; the run continued with an empty table.
    NoSources { directory: PathBuf, pattern: String },
    /// A source could not be read and was left out of the merge.
    SourceUnavailable { location: String, reason: String },
    /// A source was found but its contents could not be parsed; it was left
    /// out of the merge.
    SourceUnreadable { location: String, detail: String },
    /// A cell could not be coerced and was loaded as `Null`.
    Cell(LoadWarning),
    /// A report or its chart was written without data.
    ReportWithoutData { sheet: String, reason: String },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::NoSources { directory, pattern } => write!(
                f,
                "no sources matching {pattern} in {}",
                directory.display()
            ),
            PipelineWarning::SourceUnavailable { location, reason } => {
                write!(f, "source {location} skipped: {reason}")
            }
            PipelineWarning::SourceUnreadable { location, detail } => {
                write!(f, "source {location} skipped, unable to parse: {detail}")
            }
            PipelineWarning::Cell(warning) => write!(f, "{warning}"),
            PipelineWarning::ReportWithoutData { sheet, reason } => {
                write!(f, "sheet '{sheet}': {reason}")
            }
        }
    }
}

/// State threaded through the stages of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineContext {
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    fn warn(&mut self, warning: PipelineWarning) {
        warn!(%warning, "recovered from pipeline problem");
        self.warnings.push(warning);
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Origin labels of the sources that were merged, in merge order.
    pub sources: Vec<String>,
    pub merged_rows: usize,
    /// Names of the sheets written.
    pub sheets: Vec<String>,
    pub warnings: Vec<PipelineWarning>,
}

/// Runs a whole pipeline: discover, load, merge, transform, report, write.
#[instrument(level = "info", skip_all, fields(output = %config.output.display()))]
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    config.validate()?;
    let mut context = PipelineContext::default();

    let locations = resolve_sources(config, &mut context)?;
    let (merged, sources) = load_and_merge(
        &locations,
        &config.load.options(),
        &config.merge.options(),
        &mut context,
    )?;
    let merged_rows = merged.row_count();
    let table = if sources.is_empty() {
        merged
    } else {
        apply_transforms(merged, &config.transforms)?
    };

    let mut workbook = WorkbookData::new();
    for report in &config.reports {
        let sheet = build_report(&table, report, &config.merge.origin_column, &mut context)?;
        workbook.push(sheet);
    }
    write::write_workbook(&config.output, &workbook)?;

    let sheets: Vec<String> = workbook
        .sheets()
        .iter()
        .map(|sheet| sheet.name.clone())
        .collect();
    info!(
        sources = sources.len(),
        merged_rows,
        sheets = sheets.len(),
        warnings = context.warnings.len(),
        "pipeline finished"
    );
    Ok(RunReport {
        sources,
        merged_rows,
        sheets,
        warnings: context.warnings,
    })
}

/// Lists the sources of a run in merge order.
pub fn resolve_sources(
    config: &PipelineConfig,
    context: &mut PipelineContext,
) -> Result<Vec<SourceLocation>> {
    let sources = &config.sources;
    let paths = if !sources.files.is_empty() {
        sources.files.clone()
    } else if let Some(directory) = &sources.directory {
        let pattern = sources.pattern();
        let found = discover_sources(directory, &pattern)?;
        if found.is_empty() {
            context.warn(PipelineWarning::NoSources {
                directory: directory.clone(),
                pattern: format!("{}*.{}", pattern.prefix, pattern.extension),
            });
        }
        found
    } else {
        return Err(ToolError::InvalidConfig(
            "sources need either 'files' or 'directory'".into(),
        ));
    };

    Ok(paths
        .into_iter()
        .map(|path| SourceLocation::new(path).with_sheet(sources.sheet.clone()))
        .collect())
}

/// Loads every readable source and merges them in the order given. Returns
/// the merged table and the origin labels of the sources that made it in.
pub fn load_and_merge(
    locations: &[SourceLocation],
    load_options: &LoadOptions,
    merge_options: &MergeOptions,
    context: &mut PipelineContext,
) -> Result<(Table, Vec<String>)> {
    let mut tables = Vec::with_capacity(locations.len());
    let mut labels = Vec::with_capacity(locations.len());

    for location in locations {
        let raw = match io::read_source(location) {
            Ok(raw) => raw,
            Err(ToolError::SourceUnavailable { location, reason }) => {
                context.warn(PipelineWarning::SourceUnavailable { location, reason });
                continue;
            }
            Err(ToolError::ParseFailure { location, detail }) => {
                context.warn(PipelineWarning::SourceUnreadable { location, detail });
                continue;
            }
            Err(err) => return Err(err),
        };
        let loaded = load(&raw, load_options);
        context.warnings.extend(
            loaded
                .warnings
                .into_iter()
                .map(PipelineWarning::Cell),
        );
        debug!(
            source = %location.path.display(),
            rows = loaded.table.row_count(),
            "source ready for merge"
        );
        tables.push(loaded.table);
        labels.push(location.origin_label());
    }

    let merged = merge(tables, &labels, merge_options)?;
    Ok((merged, labels))
}

/// Applies the configured transforms in order.
pub fn apply_transforms(table: Table, steps: &[TransformStep]) -> Result<Table> {
    steps.iter().try_fold(table, |table, step| match step {
        TransformStep::Select { columns } => transform::select(&table, &as_strs(columns)),
        TransformStep::Drop { columns } => transform::drop_columns(&table, &as_strs(columns)),
        TransformStep::Filter { column, equals } => {
            transform::filter_eq(&table, column, &Value::infer(equals))
        }
        TransformStep::Month { from, into } => transform::derive_month(&table, from, into),
        TransformStep::Scale {
            from,
            factor,
            into,
        } => transform::derive_scaled(&table, from, *factor, into),
    })
}

/// Computes one report sheet from the (merged, transformed) table.
pub fn build_report(
    table: &Table,
    report: &ReportSpec,
    origin_column: &str,
    context: &mut PipelineContext,
) -> Result<SheetData> {
    let sheet = report.sheet();
    // Only the origin column is left when no source could be merged.
    if table.columns().iter().all(|column| column == origin_column) {
        context.warn(PipelineWarning::ReportWithoutData {
            sheet: sheet.to_string(),
            reason: "no source data; writing the header only".into(),
        });
        let empty = Table::new(report.empty_columns(origin_column));
        return Ok(SheetData::from_table(sheet, &empty));
    }

    let output = match report {
        ReportSpec::Merged { sort, .. } => sort_by(table, sort)?,
        ReportSpec::GroupBy {
            keys, metrics, sort, ..
        } => {
            let metrics: Vec<Metric> = metrics.iter().map(|metric| metric.metric()).collect();
            let result = group_reduce_many(table, &as_strs(keys), &metrics)?;
            result.sorted_by(sort)?.to_table()
        }
        ReportSpec::Pivot {
            rows,
            columns,
            metric,
            op,
            fill,
            sorted,
            ..
        } => {
            let result = pivot(table, rows, columns, metric, *op, *fill)?;
            if *sorted {
                result.sorted().to_table()
            } else {
                result.to_table()
            }
        }
        ReportSpec::Totals {
            category,
            amount,
            order,
            ..
        } => accumulate_table(table, category, amount)?
            .ordered(*order)
            .to_table(),
    };

    let chart = match report.chart() {
        Some(chart) => chart_for(&output, sheet, chart, context)?,
        None => None,
    };
    Ok(SheetData::from_table(sheet, &output).with_chart(chart))
}

fn chart_for(
    output: &Table,
    sheet: &str,
    config: &ChartConfig,
    context: &mut PipelineContext,
) -> Result<Option<ChartSpec>> {
    if output.is_empty() {
        context.warn(PipelineWarning::ReportWithoutData {
            sheet: sheet.to_string(),
            reason: "chart left out because the sheet has no rows".into(),
        });
        return Ok(None);
    }
    let category = column_position(output, &config.category)?;
    let value = column_position(output, &config.value)?;
    let spec = ChartSpec::for_columns(config.title.clone(), category, value, output.row_count())
        .with_axes(config.x_axis.clone(), config.y_axis.clone())
        .with_kind(config.kind);
    Ok(Some(spec))
}

fn column_position(table: &Table, column: &str) -> Result<u16> {
    let index = table.require_column(column)?;
    u16::try_from(index).map_err(|_| ToolError::InvalidRange {
        range: format!("column '{column}'"),
        extent: "the first 65536 columns".into(),
    })
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}
