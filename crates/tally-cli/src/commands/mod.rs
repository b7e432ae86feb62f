//! Subcommand implementations.

pub mod batch;
pub mod check;
pub mod config;
pub mod process;
pub mod sheet;

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tally_core::{CallContext, CancellationToken, ExtractionHints, ServiceConfig};
use tracing::{debug, warn};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("config.json")
}

/// Load the configuration from `path`, or the default location when it exists.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    match path {
        Some(path) => Ok(ServiceConfig::from_file(path)?),
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Loading configuration from {}", default_path.display());
                Ok(ServiceConfig::from_file(&default_path)?)
            } else {
                Ok(ServiceConfig::default())
            }
        }
    }
}

/// Extraction hints shared by the process and batch commands.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct HintArgs {
    /// Currency to assume when none is printed (e.g. USD, KRW)
    #[arg(long)]
    currency: Option<String>,

    /// Language the receipt is written in (e.g. en, ko)
    #[arg(long)]
    language: Option<String>,

    /// Store the receipt most likely comes from
    #[arg(long)]
    store: Option<String>,
}

impl HintArgs {
    pub fn to_hints(&self) -> ExtractionHints {
        ExtractionHints {
            currency: self.currency.clone(),
            language: self.language.clone(),
            store: self.store.clone(),
        }
    }
}

/// A call context that is cancelled on Ctrl-C.
pub fn interruptible_context() -> CallContext {
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling extraction");
            on_interrupt.cancel();
        }
    });
    CallContext::new().with_cancellation(token)
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Whether an input names a remote image rather than a local file.
pub fn is_url(input: &str) -> bool {
    let lowered = input.to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}
