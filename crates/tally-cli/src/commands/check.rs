//! Check command - run the image validator without calling the endpoint.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use tally_core::image::{
    detect_mime_type_from_bytes, image_format_info, image_size_info, validate,
};

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Image file to check
    #[arg(required = true)]
    input: PathBuf,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let bytes = fs::read(&args.input)?;

    println!("File: {}", args.input.display());
    println!("Format: {}", image_format_info(&bytes));
    println!("MIME type: {}", detect_mime_type_from_bytes(&bytes));
    println!("{}", image_size_info(&bytes));

    validate(&bytes)?;

    println!("{} Image is acceptable for extraction", style("✓").green());
    Ok(())
}
