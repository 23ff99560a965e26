//! Tracing setup for hosts embedding the library.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "vet_records_core=info";
const VERBOSE_LOG_FILTER: &str = "vet_records_core=debug";

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a stderr `fmt` subscriber. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging(verbose: bool) -> Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default).context("Invalid default log filter")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Failed to install tracing subscriber")?;

    let _ = INITIALIZED.set(());
    Ok(())
}
