//! Scan command - suggest expense fields from a receipt.

use std::fs;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Args;
use console::style;
use tracing::{info, warn};

use spendlog_core::receipt::HintMatch;
use spendlog_core::{PartialExpenseHints, ReceiptOcrClient, ReceiptScanner, ReceiptTextParser};

use super::load_config;

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Receipt image (JPEG/PNG), or a text file with --text
    #[arg(required = true)]
    input: PathBuf,

    /// Treat the input as already-extracted receipt text
    #[arg(long)]
    text: bool,

    /// Print hints as JSON
    #[arg(long)]
    json: bool,

    /// Print a complete expense record instead of hints
    #[arg(long)]
    record: bool,

    /// Category id for --record
    #[arg(long, requires = "record")]
    category: Option<String>,

    /// OCR service API key
    #[arg(long, env = "SPENDLOG_OCR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OCR service endpoint
    #[arg(long)]
    endpoint: Option<String>,
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let hints = if args.text {
        let text = fs::read_to_string(&args.input)?;
        ReceiptTextParser::new().parse(&text)
    } else {
        let config = load_config(config_path)?;
        let mut ocr = config.ocr;
        if let Some(key) = args.api_key {
            ocr.api_key = Some(key);
        }
        if let Some(endpoint) = args.endpoint {
            ocr.endpoint = endpoint;
        }

        let client = ReceiptOcrClient::new(ocr)?;
        let image = STANDARD.encode(fs::read(&args.input)?);
        info!("Scanning {} via {}", args.input.display(), client.endpoint());

        let scanner = ReceiptScanner::new(client);
        match scanner.scan(&image).await {
            Ok(hints) => hints,
            Err(e) => {
                warn!("OCR failed: {}", e);
                eprintln!(
                    "{} Could not scan receipt ({}). Enter the expense manually.",
                    style("⚠").yellow(),
                    e
                );
                PartialExpenseHints::default()
            }
        }
    };

    if args.record {
        let record = hints
            .to_record(args.category)
            .map_err(|reason| anyhow::anyhow!("Cannot build an expense: {}", reason))?;
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&hints)?);
    } else {
        print_hints(&hints);
    }

    Ok(())
}

fn print_hints(hints: &PartialExpenseHints) {
    if hints.is_empty() {
        println!("{} No expense details found.", style("ℹ").blue());
        return;
    }
    print_hint("Amount", hints.amount.as_ref().map(|h| h.clone().map(|a| format!("{a:.2}"))));
    print_hint("Date", hints.date.as_ref().map(|h| h.clone().map(|d| d.to_string())));
    print_hint("Description", hints.description.clone());
}

fn print_hint(label: &str, hint: Option<HintMatch<String>>) {
    match hint {
        Some(h) => println!(
            "{:<12} {}  {}",
            format!("{label}:"),
            style(&h.value).bold(),
            style(format!("({:.0}% from line {})", h.confidence * 100.0, h.line)).dim()
        ),
        None => println!("{:<12} {}", format!("{label}:"), style("-").dim()),
    }
}
