use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tabula_tools::accumulate::TotalsOrder;
use tabula_tools::aggregate::{AggregateOp, PivotFill};
use tabula_tools::chart::ChartKind;
use tabula_tools::config::{
    ChartConfig, LoadConfig, MergeConfig, MetricConfig, PipelineConfig, ReportSpec, SourcesConfig,
    TransformStep,
};
use tabula_tools::pipeline::{self, RunReport};
use tabula_tools::sort::SortKey;
use tabula_tools::{Result, ToolError};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "TABULA_LOG";

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.command {
        Command::Run { config } => PipelineConfig::from_path(&config)?,
        Command::Merge(args) => args.into_config(),
        Command::Summarize(args) => args.into_config(),
        Command::Pivot(args) => args.into_config(),
        Command::Totals(args) => args.into_config(),
    };
    let report = pipeline::run(&config)?;
    print_summary(&config, &report);
    Ok(())
}

fn print_summary(config: &PipelineConfig, report: &RunReport) {
    println!(
        "merged {} rows from {} sources into {} ({})",
        report.merged_rows,
        report.sources.len(),
        config.output.display(),
        report.sheets.join(", ")
    );
    if !report.warnings.is_empty() {
        println!("{} warnings; see the log for details", report.warnings.len());
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Merge spreadsheet and CSV sources, then summarise them into a workbook."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a pipeline described by a JSON configuration file.
    Run {
        #[arg(long)]
        config: PathBuf,
    },
    /// Merge the sources and write the merged rows.
    Merge(MergeArgs),
    /// Group the merged rows and reduce one metric per group.
    Summarize(SummarizeArgs),
    /// Cross-tabulate one metric over two key columns.
    Pivot(PivotArgs),
    /// Accumulate exact per-category totals of an amount column.
    Totals(TotalsArgs),
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Source files, merged in the order given.
    #[arg(long = "input", num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Directory scanned for sources when no input files are given.
    #[arg(long, conflicts_with = "inputs")]
    dir: Option<PathBuf>,

    /// File name prefix required of discovered sources.
    #[arg(long, default_value = "")]
    prefix: String,

    /// File extension required of discovered sources.
    #[arg(long, default_value = "xlsx")]
    extension: String,

    /// Worksheet to read from every workbook.
    #[arg(long)]
    sheet: Option<String>,

    /// Columns whose cells are dates.
    #[arg(long = "date-column")]
    date_columns: Vec<String>,

    /// Columns whose cells are amounts with currency marks.
    #[arg(long = "currency-column")]
    currency_columns: Vec<String>,

    /// Derive a month column from this date column.
    #[arg(long)]
    month_from: Option<String>,

    /// Name of the column recording each row's source.
    #[arg(long, default_value = tabula_tools::merge::DEFAULT_ORIGIN_COLUMN)]
    origin_column: String,

    /// Fail when a column holds different kinds of values across sources.
    #[arg(long)]
    strict: bool,

    /// Output workbook path.
    #[arg(long)]
    output: PathBuf,

    /// Output sheet name.
    #[arg(long)]
    sheet_name: Option<String>,
}

impl SourceArgs {
    fn config(self, default_sheet: &str, report: impl FnOnce(String) -> ReportSpec) -> PipelineConfig {
        let sheet = self
            .sheet_name
            .unwrap_or_else(|| default_sheet.to_string());
        let transforms = self
            .month_from
            .map(|from| TransformStep::Month {
                from,
                into: "month".to_string(),
            })
            .into_iter()
            .collect();
        PipelineConfig {
            sources: SourcesConfig {
                directory: self.dir,
                prefix: self.prefix,
                extension: self.extension,
                sheet: self.sheet,
                ..SourcesConfig::files(self.inputs)
            },
            load: LoadConfig {
                date_columns: self.date_columns,
                currency_columns: self.currency_columns,
            },
            merge: MergeConfig {
                origin_column: self.origin_column,
                strict: self.strict,
            },
            transforms,
            reports: vec![report(sheet)],
            output: self.output,
        }
    }
}

/// Column chart over two columns of the written sheet.
#[derive(clap::Args)]
struct ChartArgs {
    /// Chart title; a chart is only added when this is set.
    #[arg(long)]
    chart_title: Option<String>,

    #[arg(long, value_enum, default_value_t = ChartKindArg::Column)]
    chart_kind: ChartKindArg,
}

impl ChartArgs {
    fn chart(self, category: &str, value: &str) -> Option<ChartConfig> {
        self.chart_title.map(|title| ChartConfig {
            title,
            x_axis: category.to_string(),
            y_axis: value.to_string(),
            kind: self.chart_kind.into(),
            category: category.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(clap::Args)]
struct MergeArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Sort keys as `column` or `column:desc`.
    #[arg(long, value_parser = parse_sort_key)]
    sort: Vec<SortKey>,
}

impl MergeArgs {
    fn into_config(self) -> PipelineConfig {
        let sort = self.sort;
        self.sources.config("merged", |sheet| ReportSpec::Merged {
            sheet,
            sort,
            chart: None,
        })
    }
}

#[derive(clap::Args)]
struct SummarizeArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Grouping columns.
    #[arg(long = "key", required = true)]
    keys: Vec<String>,

    /// Column reduced per group.
    #[arg(long)]
    metric: String,

    #[arg(long, value_enum, default_value_t = OpArg::Sum)]
    op: OpArg,

    #[command(flatten)]
    chart: ChartArgs,
}

impl SummarizeArgs {
    fn into_config(self) -> PipelineConfig {
        let sort = self.keys.iter().cloned().map(SortKey::asc).collect();
        let chart = self.chart.chart(&self.keys[0], &self.metric);
        let keys = self.keys;
        let metric = MetricConfig {
            column: self.metric,
            op: self.op.into(),
            name: None,
        };
        self.sources.config("summary", |sheet| ReportSpec::GroupBy {
            sheet,
            keys,
            metrics: vec![metric],
            sort,
            chart,
        })
    }
}

#[derive(clap::Args)]
struct PivotArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Column whose values become the pivot rows.
    #[arg(long)]
    rows: String,

    /// Column whose values become the pivot columns.
    #[arg(long)]
    columns: String,

    #[arg(long)]
    metric: String,

    #[arg(long, value_enum, default_value_t = OpArg::Sum)]
    op: OpArg,

    /// Value of cells whose row and column never occur together.
    #[arg(long, value_enum, default_value_t = FillArg::Zero)]
    fill: FillArg,
}

impl PivotArgs {
    fn into_config(self) -> PipelineConfig {
        let (rows, columns, metric) = (self.rows, self.columns, self.metric);
        let (op, fill) = (self.op.into(), self.fill.into());
        self.sources.config("pivot", |sheet| ReportSpec::Pivot {
            sheet,
            rows,
            columns,
            metric,
            op,
            fill,
            sorted: true,
            chart: None,
        })
    }
}

#[derive(clap::Args)]
struct TotalsArgs {
    #[command(flatten)]
    sources: SourceArgs,

    #[arg(long)]
    category: String,

    #[arg(long)]
    amount: String,

    #[arg(long, value_enum, default_value_t = OrderArg::FirstSeen)]
    order: OrderArg,

    #[command(flatten)]
    chart: ChartArgs,
}

impl TotalsArgs {
    fn into_config(self) -> PipelineConfig {
        let chart = self.chart.chart(&self.category, &self.amount);
        let (category, amount, order) = (self.category, self.amount, self.order.into());
        self.sources.config("totals", |sheet| ReportSpec::Totals {
            sheet,
            category,
            amount,
            order,
            chart,
        })
    }
}

fn parse_sort_key(text: &str) -> std::result::Result<SortKey, String> {
    match text.rsplit_once(':') {
        Some((column, "asc")) => Ok(SortKey::asc(column)),
        Some((column, "desc")) => Ok(SortKey::desc(column)),
        Some((_, direction)) => Err(format!(
            "unknown sort direction '{direction}', expected 'asc' or 'desc'"
        )),
        None => Ok(SortKey::asc(text)),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OpArg {
    Sum,
    Mean,
    Max,
    Count,
}

impl From<OpArg> for AggregateOp {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Sum => AggregateOp::Sum,
            OpArg::Mean => AggregateOp::Mean,
            OpArg::Max => AggregateOp::Max,
            OpArg::Count => AggregateOp::Count,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FillArg {
    Zero,
    Empty,
}

impl From<FillArg> for PivotFill {
    fn from(fill: FillArg) -> Self {
        match fill {
            FillArg::Zero => PivotFill::Zero,
            FillArg::Empty => PivotFill::Empty,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OrderArg {
    FirstSeen,
    TotalDescending,
}

impl From<OrderArg> for TotalsOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::FirstSeen => TotalsOrder::FirstSeen,
            OrderArg::TotalDescending => TotalsOrder::TotalDescending,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ChartKindArg {
    Column,
    Bar,
    Line,
    Pie,
}

impl From<ChartKindArg> for ChartKind {
    fn from(kind: ChartKindArg) -> Self {
        match kind {
            ChartKindArg::Column => ChartKind::Column,
            ChartKindArg::Bar => ChartKind::Bar,
            ChartKindArg::Line => ChartKind::Line,
            ChartKindArg::Pie => ChartKind::Pie,
        }
    }
}
