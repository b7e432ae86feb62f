//! Batch processing command for multiple receipt images.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use tally_core::normalize::append_receipts;
use tally_core::{CallContext, ReceiptEntry, ReceiptRecord, ReceiptService};

use super::sheet::CsvSheet;
use super::{HintArgs, interruptible_context, load_config};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching receipt images
    #[arg(required = true)]
    input: String,

    /// CSV sheet that receives one row per receipt
    #[arg(long, required = true)]
    sheet: PathBuf,

    #[command(flatten)]
    hints: HintArgs,

    /// Prefix joined with each file name to form the receipt link
    #[arg(long)]
    link_prefix: Option<String>,

    /// Also write each extracted receipt as JSON into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    record: Option<ReceiptRecord>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let service = ReceiptService::new(config)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} receipts to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} receipts")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let ctx = interruptible_context();
    let mut results = Vec::with_capacity(files.len());

    for path in files {
        if ctx.is_cancelled() {
            warn!("Batch interrupted, skipping remaining files");
            break;
        }

        match process_single_file(&service, &ctx, &path, &args).await {
            Ok(record) => {
                results.push(ProcessResult {
                    path,
                    record: Some(record),
                    error: None,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(ProcessResult {
                        path,
                        record: None,
                        error: Some(error_msg),
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    overall_pb.abandon();
                    anyhow::bail!("Processing failed for {}: {}", path.display(), error_msg);
                }
            }
        }

        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    let successful: Vec<_> = results.iter().filter(|r| r.record.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Some(record) = &result.record {
                let output_name = result.path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("receipt");
                let output_path = output_dir.join(format!("{}.json", output_name));
                fs::write(&output_path, record.to_pretty_json()?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    let entries: Vec<ReceiptEntry> = successful
        .iter()
        .map(|result| {
            ReceiptEntry::new(
                result.record.clone(),
                receipt_link(&result.path, args.link_prefix.as_deref()),
                "",
            )
        })
        .collect();

    let mut sheet = CsvSheet::new(&args.sheet);
    if !entries.is_empty() {
        let written = append_receipts(&mut sheet, &entries);
        if written > 0 {
            println!(
                "{} Added {} receipts to {}",
                style("✓").green(),
                written,
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

    println!();
    println!(
        "{} Processed {} receipts in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn process_single_file(
    service: &ReceiptService,
    ctx: &CallContext,
    path: &Path,
    args: &BatchArgs,
) -> anyhow::Result<ReceiptRecord> {
    let bytes = fs::read(path)?;
    let outcome = service
        .extract_from_bytes(ctx, &bytes, &args.hints.to_hints())
        .await;
    Ok(outcome.into_result()?)
}

/// Link for a processed file: prefix plus file name, or the local path.
fn receipt_link(path: &Path, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            format!("{}/{}", prefix.trim_end_matches('/'), name)
        }
        None => path.display().to_string(),
    }
}
