//! Tracing setup for flightdeck
//!
//! Console output goes to stderr so stdout stays clean for query results.
//! A log file, when configured, receives the same events without ANSI colors.
//!
//! Environment variables:
//!   RUST_LOG                          # Log filter (default: configured level)

use crate::config::LoggingConfig;
use crate::core::{FlightsError, Result};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Picks the filter: `RUST_LOG` wins, then `-v`, then the configured level.
fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"))
        }
    })
}

/// Installs the global subscriber.
///
/// Creates the log file's parent directory when needed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(config, verbose))
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|err| FlightsError::Logging(err.to_string()))?;

    if let Some(path) = &config.file {
        tracing::debug!(file = %path.display(), "file logging enabled");
    }
    Ok(())
}
