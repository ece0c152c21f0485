use batchpay::{
    config::{HeaderMode, IngestConfig},
    engine::ingest::{IngestEvent, IngestOutcome},
    engine::summary::{format_count, format_currency},
    session::BatchSession,
    stream_records,
};

use anyhow::{bail, Context};
use clap::Parser;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "batchpay", about = "Validate a batch transfer CSV before submission")]
struct Args {
    /// Path to the CSV file
    #[arg(default_value = "transactions.csv")]
    csv_file: PathBuf,

    #[arg(long, env = "BATCHPAY_BATCH_NAME", default_value = "")]
    batch_name: String,

    #[arg(long, env = "BATCHPAY_APPROVER", default_value = "")]
    approver: String,

    /// Also accept header synonyms such as "Txn Date"
    #[arg(long, env = "BATCHPAY_PERMISSIVE_HEADERS")]
    permissive: bool,

    /// Only list invalid rows in the review
    #[arg(long)]
    only_invalid: bool,

    #[arg(long, env = "BATCHPAY_WATCHDOG_MS", default_value_t = 5000)]
    watchdog_ms: u64,

    #[arg(long, env = "BATCHPAY_BATCH_SIZE", default_value_t = 1000)]
    batch_size: usize,

    #[arg(long, env = "BATCHPAY_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn ingest_config(&self) -> IngestConfig {
        let mode = if self.permissive {
            HeaderMode::Permissive
        } else {
            HeaderMode::Strict
        };
        IngestConfig::new()
            .with_header_mode(mode)
            .with_batch_size(self.batch_size)
            .with_watchdog_timeout(Duration::from_millis(self.watchdog_ms))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);
    validate_csv_file(&args.csv_file)?;
    process_batch(&args).await
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn validate_csv_file(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        bail!("File '{}' does not exist", path.display());
    }
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        bail!("File '{}' is not a CSV file", path.display());
    }
    Ok(())
}

async fn process_batch(args: &Args) -> anyhow::Result<()> {
    let mut session = BatchSession::new();
    session.set_details(&args.batch_name, &args.approver, Some(args.csv_file.clone()));

    let mut handle = stream_records(&args.csv_file, args.ingest_config());
    let mut outcome = None;
    while let Some(event) = handle.next_event().await {
        if let IngestEvent::Done(done) = &event {
            outcome = Some(done.clone());
        }
        if session.apply(event) {
            break;
        }
        tracing::debug!(records = session.records().len(), "snapshot received");
    }

    if let Some(IngestOutcome::Failed(reason)) = &outcome {
        tracing::warn!(%reason, "ingestion ended early; showing what was parsed");
    }

    print_review(&session, args.only_invalid);
    print_summary(&session);

    if !session.can_submit() {
        bail!("No valid transactions found in '{}'", args.csv_file.display());
    }

    let created_at = chrono::Utc::now().timestamp_millis();
    let transactions = session.submit(created_at);
    let mut writer = csv::Writer::from_writer(stdout());
    for tx in &transactions {
        writer.serialize(tx).context("writing transaction")?;
    }
    writer.flush()?;
    Ok(())
}

fn print_review(session: &BatchSession, only_invalid: bool) {
    eprintln!(
        "Valid: {}  Invalid: {}",
        format_count(session.valid_count()),
        format_count(session.invalid_count())
    );

    for (row, record) in session.review_rows(only_invalid) {
        if record.is_valid {
            eprintln!("  row {:>6}  ok", row);
            continue;
        }
        eprintln!("  row {:>6}  FAILED", row);
        for (field, messages) in record.errors.iter() {
            eprintln!("      {}: {}", field, messages.join("; "));
        }
    }
}

fn print_summary(session: &BatchSession) {
    let stats = session.summary();
    eprintln!("Batch name: {}", session.batch_name());
    eprintln!("Approver:   {}", session.approver());

    if stats.number_of_payments == 0 {
        eprintln!("No valid transactions found. Please review and correct the CSV data.");
        return;
    }
    eprintln!("Total amount:          {}", format_currency(stats.total_amount));
    eprintln!("Number of payments:    {}", format_count(stats.number_of_payments));
    eprintln!(
        "Average payment value: {}",
        format_currency(stats.average_payment_value)
    );
}
