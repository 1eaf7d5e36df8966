//! Import command - turn a CSV or spreadsheet into expense records.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use spendlog_core::{
    BulkImportCoordinator, Category, ColumnMapper, ColumnMapping, DateParsingMode, ExpenseRecord,
    FieldKey, FileKind, ImportOutcome, ImportState, PersistenceError, RowValidator, SpendlogConfig,
    TabularParser,
};

use super::load_config;

/// Arguments for the import command.
#[derive(Args)]
pub struct ImportArgs {
    /// Input file (CSV, XLSX, XLS, ODS)
    #[arg(required = true)]
    input: PathBuf,

    /// File kind, when the extension is missing or misleading
    #[arg(short, long)]
    kind: Option<FileKind>,

    /// JSON file with categories ([{"$id": "...", "category_name": "..."}])
    #[arg(long)]
    categories: Option<PathBuf>,

    /// Manual column assignment, e.g. --map "spent=amount" (repeatable)
    #[arg(short, long = "map", value_name = "HEADER=FIELD")]
    mappings: Vec<String>,

    /// What to do with rows that have no date
    #[arg(long, value_enum)]
    date_mode: Option<DateModeArg>,

    /// Fail when any row is rejected
    #[arg(long)]
    strict: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show the mapping and validation summary without writing records
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum DateModeArg {
    /// Reject rows without a date
    Strict,
    /// Use the current time for rows without a date
    Lenient,
}

impl From<DateModeArg> for DateParsingMode {
    fn from(arg: DateModeArg) -> Self {
        match arg {
            DateModeArg::Strict => DateParsingMode::Strict,
            DateModeArg::Lenient => DateParsingMode::Lenient,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON array
    Json,
    /// CSV with a header row
    Csv,
}

pub async fn run(args: ImportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(mode) = args.date_mode {
        config.import.date_mode = mode.into();
    }
    config.import.strict |= args.strict;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Importing file: {}", args.input.display());

    let kind = match args.kind {
        Some(kind) => kind,
        None => FileKind::from_path(&args.input)?,
    };
    let data = fs::read(&args.input)?;
    let table = TabularParser::new().parse(&data, kind)?;

    eprintln!(
        "{} Read {} rows with columns: {}",
        style("ℹ").blue(),
        table.rows().len(),
        table.headers().join(", ")
    );

    let mapper = ColumnMapper::new().with_min_confidence(config.import.min_confidence);
    let mut mapping = mapper.infer_mapping(table.headers());
    apply_manual_mappings(&mut mapping, &args.mappings)?;
    print_mapping(&mapping);

    if let Err(e) = mapper.review(&mapping) {
        anyhow::bail!("{}. Assign columns with --map HEADER=FIELD.", e);
    }

    let categories = load_categories(args.categories.as_ref())?;
    let validator = RowValidator::new(&mapping, &categories, config.import.date_mode)?;
    let report = validator.validate_all(table.rows());

    let mut outcome = ImportOutcome::new();
    for rejection in &report.rejections {
        outcome.record_rejection(rejection);
    }

    if args.dry_run {
        for _ in &report.records {
            outcome.record_success();
        }
        print_summary(&outcome, &config);
        eprintln!("{} Dry run, nothing written.", style("ℹ").blue());
        return Ok(());
    }

    // strict imports are all-or-nothing
    if config.import.strict && !outcome.is_clean() {
        print_summary(&outcome, &config);
        anyhow::bail!(
            "Import failed: {} of {} records failed",
            outcome.failed_count,
            outcome.failed_count + report.records.len()
        );
    }

    // persistence failures are reported against source rows, like rejections
    let (records, persisted) = persist_records(report.records, report.source_rows, &config).await?;
    outcome.success_count += persisted.success_count;
    outcome.failed_count += persisted.failed_count;
    outcome.errors.extend(persisted.errors);

    let output = format_records(&records, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    print_summary(&outcome, &config);
    debug!("Total import time: {:?}", start.elapsed());

    if config.import.strict && !outcome.is_clean() {
        anyhow::bail!(
            "Import failed: {} of {} records failed",
            outcome.failed_count,
            outcome.total()
        );
    }

    Ok(())
}

fn apply_manual_mappings(mapping: &mut ColumnMapping, pairs: &[String]) -> anyhow::Result<()> {
    for pair in pairs {
        let (header, field) = pair
            .rsplit_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid mapping \"{}\", expected HEADER=FIELD", pair))?;
        let field: FieldKey = field.parse()?;
        mapping.assign(header, field)?;
        debug!("Manually mapped \"{}\" to {}", header, field);
    }
    Ok(())
}

fn load_categories(path: Option<&PathBuf>) -> anyhow::Result<Vec<Category>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = fs::read_to_string(path)?;
    let categories: Vec<Category> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid categories file {}: {}", path.display(), e))?;
    info!("Loaded {} categories", categories.len());
    Ok(categories)
}

fn print_mapping(mapping: &ColumnMapping) {
    eprintln!("{}", style("Column mapping:").bold());
    for (header, assignment) in mapping.iter() {
        let confidence = if assignment.manual {
            style("manual".to_string()).cyan()
        } else if assignment.confidence >= 80 {
            style(format!("{}%", assignment.confidence)).green()
        } else {
            style(format!("{}%", assignment.confidence)).yellow()
        };
        eprintln!("  {:<24} → {:<12} {}", header, assignment.field, confidence);
    }
}

/// Run records through the bulk importer into an in-memory sink.
async fn persist_records(
    records: Vec<ExpenseRecord>,
    source_rows: Vec<usize>,
    config: &SpendlogConfig,
) -> anyhow::Result<(Vec<ExpenseRecord>, ImportOutcome)> {
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let observer_pb = pb.clone();
    let coordinator = BulkImportCoordinator::from_config(&config.import)
        .with_strict(false)
        .with_observer(move |state| {
            let message = match state {
                ImportState::Running { batch, .. } => format!("batch {}", batch + 1),
                ImportState::Throttled { .. } => "rate limited, waiting".to_string(),
                ImportState::RetryingIndividually { pending, .. } => {
                    format!("retrying {pending} records")
                }
                ImportState::Idle => String::new(),
            };
            observer_pb.set_message(message);
        });

    let sink: Arc<Mutex<Vec<ExpenseRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let outcome = coordinator
        .import_numbered(records, source_rows, |record| {
            let sink = Arc::clone(&sink);
            let pb = pb.clone();
            async move {
                store_record(&sink, record)?;
                pb.inc(1);
                Ok::<(), PersistenceError>(())
            }
        })
        .await?;

    pb.finish_and_clear();

    let records = sink
        .lock()
        .map_err(|_| anyhow::anyhow!("Record store is unusable after a failed write"))?
        .clone();

    Ok((records, outcome))
}

fn store_record(
    sink: &Mutex<Vec<ExpenseRecord>>,
    record: ExpenseRecord,
) -> Result<(), PersistenceError> {
    let mut stored = sink
        .lock()
        .map_err(|_| PersistenceError::new("record store lock poisoned"))?;
    stored.push(record);
    Ok(())
}

fn format_records(records: &[ExpenseRecord], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for record in records {
                writer.serialize(record)?;
            }
            let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e))?;
            Ok(String::from_utf8(bytes)?.trim_end().to_string())
        }
    }
}

fn print_summary(outcome: &ImportOutcome, config: &SpendlogConfig) {
    eprintln!();
    eprintln!(
        "Imported: {} succeeded, {} failed",
        style(outcome.success_count).green(),
        style(outcome.failed_count).red()
    );
    if !outcome.is_clean() {
        eprintln!("{}", style("Errors:").red());
        for line in outcome.summary_lines(config.import.max_reported_errors) {
            eprintln!("  {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_mapping_specs() {
        let mut mapping = ColumnMapper::new().infer_mapping(&["spent", "what"]);
        apply_manual_mappings(
            &mut mapping,
            &["spent=amount".to_string(), "What=description".to_string()],
        )
        .unwrap();
        assert_eq!(mapping.get("spent").unwrap().field, FieldKey::Amount);
        assert!(mapping.get("what").unwrap().manual);

        assert!(apply_manual_mappings(&mut mapping, &["spent".to_string()]).is_err());
        assert!(apply_manual_mappings(&mut mapping, &["spent=price".to_string()]).is_err());
        assert!(apply_manual_mappings(&mut mapping, &["nope=amount".to_string()]).is_err());
    }

    #[test]
    fn test_poisoned_store_fails_the_record() {
        let sink: Arc<Mutex<Vec<ExpenseRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoner = Arc::clone(&sink);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("writer crashed");
        })
        .join();

        let record = spendlog_core::ReceiptTextParser::new()
            .parse("WALMART\nTOTAL: $5.00\n01/02/2024")
            .to_record(None)
            .unwrap();
        let err = store_record(&sink, record).unwrap_err();
        assert_eq!(err.message(), "record store lock poisoned");
    }
}
