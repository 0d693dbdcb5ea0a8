//! Key Rotator
//!
//! Command-line front end for a persisted key rotation pool:
//! 1. Loads config (CLI arg > env > file > defaults)
//! 2. Opens the pool, self-healing a corrupt snapshot
//! 3. Runs one subcommand and prints its JSON result on stdout
//!    (`status` includes this run's pool counters)
//!
//! Logs go to stderr as JSON so stdout stays machine-readable.

mod cli;
mod command;
mod config;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use key_pool::{RotationManager, SystemClock};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::Config;

fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Install before the pool loads so load-time resets and recoveries are counted
    let prometheus = crate::metrics::install_recorder()?;

    let (config_path, config) = Config::load_resolved(cli.config.as_deref())
        .context("failed to load configuration")?;
    debug!(config = %config_path.display(), "configuration resolved");

    let kind = config.policy_kind();
    let clock = Arc::new(SystemClock);
    let mut manager = match config.pool.state_file {
        Some(ref path) => RotationManager::open_path(kind, path.clone(), clock)
            .with_context(|| format!("failed to open pool at {}", path.display()))?,
        None => {
            info!("no state_file configured, pool is memory only");
            RotationManager::in_memory(kind, clock)
        }
    };

    let output = command::execute(&cli.command, &mut manager, Some(&prometheus))?;
    let rendered = serde_json::to_string_pretty(&output).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
