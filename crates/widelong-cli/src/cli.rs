use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use widelong_core::io::{read_csv, write_csv, CsvError, CsvOptions};
use widelong_core::{
    check_wide_coverage, run_pipeline, CoverageReport, CrossTab, MetadataTable, OrderingSpec,
    PipelineConfig, Table, UnmatchedKeyWarning,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "widelong")]
#[command(about = "Reshape a wide CSV into long format and attach per-column metadata.")]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reshape, join metadata, apply orderings and emit the long table.
    Run(RunArgs),
    /// Check that every measure column has exactly one metadata row.
    Coverage(CoverageArgs),
    /// Print a frequency table of two fields of the joined output.
    Crosstab(CrosstabArgs),
}

#[derive(Debug, clap::Args)]
struct InputArgs {
    /// Wide CSV: one row per entity, one column per measured variable.
    #[arg(long)]
    wide: PathBuf,

    /// Metadata CSV: one row per measure column of the wide CSV.
    #[arg(long)]
    metadata: PathBuf,

    /// Column of the metadata CSV holding the measure-column names.
    #[arg(long = "metadata-key", default_value = "key")]
    metadata_key: String,

    /// Identifier column carried through unchanged (repeatable). Overrides the config file.
    #[arg(long = "id")]
    id_columns: Vec<String>,

    /// Pipeline configuration file (JSON).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Field delimiter for CSV input and output.
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

#[derive(Debug, clap::Args)]
struct PipelineArgs {
    /// Name of the long-format field holding measure-column names.
    #[arg(long = "key-field")]
    key_field: Option<String>,

    /// Name of the long-format field holding cell values.
    #[arg(long = "value-field")]
    value_field: Option<String>,

    /// Order a joined field as a categorical (repeatable).
    ///
    /// Format: `<field>` to use the metadata row order, or `<field>=<level>,<level>,...`.
    #[arg(long = "order", value_name = "SPEC")]
    orders: Vec<String>,

    /// Fail on unmatched metadata keys and unclassified category values.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Sort output rows by these fields (repeatable; categorical fields sort by level).
    #[arg(long = "sort", value_name = "FIELD")]
    sort: Vec<String>,

    /// Output path. Defaults to stdout.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(Debug, clap::Args)]
struct CoverageArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
}

#[derive(Debug, clap::Args)]
struct CrosstabArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Field listed down the rows. Defaults to the key field.
    #[arg(long)]
    rows: Option<String>,

    /// Field listed across the columns.
    #[arg(long)]
    columns: String,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
}

#[derive(Debug, Serialize)]
struct JsonRunReport<'a> {
    coverage: &'a CoverageReport,
    warnings: &'a [UnmatchedKeyWarning],
    rows: &'a Table,
}

#[derive(Debug, Serialize)]
struct JsonCoverageReport<'a> {
    complete: bool,
    measure_columns: usize,
    #[serde(flatten)]
    report: &'a CoverageReport,
}

pub fn run() -> Result<()> {
    init_logging();
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    match args.command {
        Command::Run(args) => run_command(args),
        Command::Coverage(args) => coverage_command(args),
        Command::Crosstab(args) => crosstab_command(args),
    }
}

fn init_logging() {
    // A subscriber may already be installed when `run` is called more than once in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

struct Inputs {
    wide: Table,
    meta: MetadataTable,
    config: PipelineConfig,
    delimiter: u8,
}

fn load_inputs(input: &InputArgs) -> Result<Inputs> {
    if !input.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got '{}'", input.delimiter);
    }
    let delimiter = input.delimiter as u8;
    let options = CsvOptions {
        delimiter,
        ..CsvOptions::default()
    };

    let wide = read_table(&input.wide, &options)?;
    let meta_options = CsvOptions {
        text_columns: vec![input.metadata_key.clone()],
        ..options.clone()
    };
    let meta_table = read_table(&input.metadata, &meta_options)?;
    let meta = MetadataTable::from_table(meta_table, input.metadata_key.clone())
        .with_context(|| format!("metadata {}", input.metadata.display()))?;

    let mut config = match &input.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    if !input.id_columns.is_empty() {
        config.id_columns = input.id_columns.clone();
    }

    tracing::debug!(
        wide_rows = wide.row_count(),
        metadata_rows = meta.row_count(),
        "loaded inputs"
    );
    Ok(Inputs {
        wide,
        meta,
        config,
        delimiter,
    })
}

fn read_table(path: &Path, options: &CsvOptions) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_csv(BufReader::new(file), options).with_context(|| format!("read {}", path.display()))
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
}

fn apply_pipeline_args(mut config: PipelineConfig, args: &PipelineArgs) -> Result<PipelineConfig> {
    if let Some(key_field) = &args.key_field {
        config.key_field = key_field.clone();
    }
    if let Some(value_field) = &args.value_field {
        config.value_field = value_field.clone();
    }
    for spec in &args.orders {
        config.ordering.push(parse_order_spec(spec)?);
    }
    if args.strict {
        config = config.strict();
    }
    Ok(config)
}

fn parse_order_spec(input: &str) -> Result<OrderingSpec> {
    let trimmed = input.trim();
    let Some((field, levels)) = trimmed.split_once('=') else {
        if trimmed.is_empty() {
            bail!("empty --order value");
        }
        return Ok(OrderingSpec::from_metadata(trimmed));
    };
    let field = field.trim();
    if field.is_empty() {
        bail!("invalid --order '{trimmed}' (expected format: <field> or <field>=<level>,...)");
    }
    Ok(OrderingSpec::explicit(
        field,
        levels.split(',').map(str::trim).filter(|l| !l.is_empty()),
    ))
}

fn run_command(args: RunArgs) -> Result<()> {
    let inputs = load_inputs(&args.input)?;
    let config = apply_pipeline_args(inputs.config, &args.pipeline)?;

    let mut output = run_pipeline(&inputs.wide, &inputs.meta, &config)?;
    if !args.sort.is_empty() {
        let fields: Vec<&str> = args.sort.iter().map(String::as_str).collect();
        output.table = output.table.sort_by(&fields)?;
    }
    if !output.warnings.is_empty() {
        tracing::warn!(
            dropped_rows = output.warnings.iter().map(|w| w.dropped_rows).sum::<usize>(),
            "some measure columns had no metadata; run `widelong coverage` for details"
        );
    }

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    match args.format {
        OutputFormat::Csv => {
            ignore_broken_pipe(write_csv(output.table.table(), sink, inputs.delimiter))
        }
        OutputFormat::Json => {
            let report = JsonRunReport {
                coverage: &output.coverage,
                warnings: &output.warnings,
                rows: output.table.table(),
            };
            write_json(sink, &report)
        }
    }
}

fn coverage_command(args: CoverageArgs) -> Result<()> {
    let inputs = load_inputs(&args.input)?;
    let measure_columns =
        widelong_core::measure_columns(&inputs.wide, &inputs.config.id_columns)?.len();
    let report = check_wide_coverage(&inputs.wide, &inputs.config.id_columns, &inputs.meta)?;

    match args.format {
        ReportFormat::Text => {
            let mut out = String::new();
            out.push_str("Metadata coverage\n");
            out.push_str(&format!("  wide: {}\n", args.input.wide.display()));
            out.push_str(&format!("  metadata: {}\n", args.input.metadata.display()));
            out.push_str(&format!("  measure columns: {measure_columns}\n"));
            out.push_str(&format!("  missing: {}\n", join_or_none(&report.missing)));
            out.push_str(&format!("  unused: {}\n", join_or_none(&report.unused)));
            let duplicates: Vec<String> = report
                .duplicates
                .iter()
                .map(|(key, count)| format!("{key} (x{count})"))
                .collect();
            out.push_str(&format!("  duplicated: {}\n", join_or_none(&duplicates)));
            out.push_str(if report.is_complete() {
                "Result: complete\n"
            } else {
                "Result: INCOMPLETE\n"
            });
            write_text(&out)?;
        }
        ReportFormat::Json => {
            let json = JsonCoverageReport {
                complete: report.is_complete(),
                measure_columns,
                report: &report,
            };
            write_json(std::io::stdout().lock(), &json)?;
        }
    }

    if !report.is_complete() {
        std::process::exit(1);
    }
    Ok(())
}

fn crosstab_command(args: CrosstabArgs) -> Result<()> {
    let inputs = load_inputs(&args.input)?;
    let config = apply_pipeline_args(inputs.config, &args.pipeline)?;
    let rows = args.rows.clone().unwrap_or_else(|| config.key_field.clone());

    let output = run_pipeline(&inputs.wide, &inputs.meta, &config)?;
    let tab: CrossTab = output.table.crosstab(&rows, &args.columns)?;

    match args.format {
        ReportFormat::Text => write_text(&tab.to_string()),
        ReportFormat::Json => write_json(std::io::stdout().lock(), &tab),
    }
}

fn join_or_none<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn write_text(text: &str) -> Result<()> {
    let mut handle = std::io::stdout().lock();
    ignore_broken_pipe_io(handle.write_all(text.as_bytes()).and_then(|()| handle.flush()))
}

fn write_json<W: Write, T: Serialize>(mut sink: W, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    ignore_broken_pipe_io(sink.write_all(&bytes).and_then(|()| sink.flush()))
}

fn ignore_broken_pipe(result: std::result::Result<(), CsvError>) -> Result<()> {
    match result {
        Err(CsvError::Io(err)) => ignore_broken_pipe_io(Err(err)),
        other => Ok(other?),
    }
}

/// A closed stdout (e.g. `widelong run ... | head`) is not an error.
fn ignore_broken_pipe_io(result: std::io::Result<()>) -> Result<()> {
    match result {
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => Ok(other?),
    }
}
