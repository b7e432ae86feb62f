//! Process command - extract data from a single receipt.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use tally_core::normalize::append_receipts;
use tally_core::{ReceiptEntry, ReceiptRecord, ReceiptService, SHEET_HEADER, format_for_spreadsheet};

use super::sheet::CsvSheet;
use super::{HintArgs, interruptible_context, is_url, load_config, spinner};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Receipt image file or http(s) URL
    #[arg(required = true)]
    input: String,

    #[command(flatten)]
    hints: HintArgs,

    /// Receipt link for the sheet row (defaults to the input URL)
    #[arg(long)]
    link: Option<String>,

    /// Free-form memo for the sheet row
    #[arg(long, default_value = "")]
    memo: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Append the receipt to this CSV sheet
    #[arg(long)]
    sheet: Option<PathBuf>,

    /// Report completeness issues in the extracted data
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Full receipt as JSON
    Json,
    /// Spreadsheet row as a JSON array
    Row,
    /// Header and spreadsheet row as CSV
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let service = ReceiptService::new(config)?;
    let ctx = interruptible_context();
    let hints = args.hints.to_hints();

    info!("Processing receipt: {}", args.input);

    let outcome = if is_url(&args.input) {
        let pb = spinner("Extracting receipt...");
        let outcome = service.extract_from_url(&ctx, &args.input, &hints).await;
        pb.finish_and_clear();
        outcome
    } else {
        let path = Path::new(&args.input);
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }
        let bytes = fs::read(path)?;
        let pb = spinner("Extracting receipt...");
        let outcome = service.extract_from_bytes(&ctx, &bytes, &hints).await;
        pb.finish_and_clear();
        outcome
    };

    if let Some(raw) = outcome.raw_text.as_deref().filter(|_| !outcome.success) {
        debug!("Raw response text: {}", raw);
    }
    let record = outcome.into_result()?;

    if args.validate {
        let issues = record.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let link = args
        .link
        .clone()
        .unwrap_or_else(|| if is_url(&args.input) { args.input.clone() } else { String::new() });

    let output = format_receipt(&record, args.format, &link, &args.memo)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(sheet_path) = &args.sheet {
        let mut sheet = CsvSheet::new(sheet_path);
        let written = append_receipts(&mut sheet, &[ReceiptEntry::new(Some(record), link, args.memo)]);
        if written > 0 {
            println!(
                "{} Added receipt to {}",
                style("✓").green(),
                sheet.path().display()
            );
        } else {
            eprintln!(
                "{} Could not append to {}",
                style("!").yellow(),
                sheet.path().display()
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_receipt(
    record: &ReceiptRecord,
    format: OutputFormat,
    link: &str,
    memo: &str,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(record.to_pretty_json()?),
        OutputFormat::Row => Ok(serde_json::to_string(&format_for_spreadsheet(Some(record), link, memo))?),
        OutputFormat::Csv => format_csv(record, link, memo),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &ReceiptRecord, link: &str, memo: &str) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(SHEET_HEADER)?;
    wtr.write_record(
        format_for_spreadsheet(Some(record), link, memo)
            .iter()
            .map(|cell| cell.to_string()),
    )?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &ReceiptRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!("Store: {}\n", record.store_name));
    if let Some(address) = record.store_address.as_deref().filter(|a| !a.trim().is_empty()) {
        output.push_str(&format!("  {}\n", address));
    }
    if let Some(date) = record.receipt_date {
        output.push_str(&format!("Date: {}\n", date.format("%Y-%m-%d %H:%M")));
    }
    if let Some(category) = &record.expense_category {
        output.push_str(&format!("Category: {}\n", category.label()));
    }
    output.push('\n');

    if !record.items.is_empty() {
        output.push_str("Items:\n");
        for item in &record.items {
            output.push_str(&format!(
                "  {} x{} {:.2}\n",
                item.name, item.quantity, item.total_price
            ));
        }
        output.push('\n');
    }

    output.push_str("Summary:\n");
    if record.subtotal_amount > 0.0 {
        output.push_str(&format!("  Subtotal: {:.2} {}\n", record.subtotal_amount, record.currency));
    }
    if record.tax_amount > 0.0 {
        output.push_str(&format!("  Tax:      {:.2} {}\n", record.tax_amount, record.currency));
    }
    output.push_str(&format!("  Total:    {:.2} {}\n", record.total_amount, record.currency));

    if let Some(payment) = record.payment_method.as_deref().filter(|p| !p.trim().is_empty()) {
        output.push_str(&format!("\nPaid by: {}\n", payment));
    }

    output
}
