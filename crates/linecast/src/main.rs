//! Linecast - Reliable delivery of serial device logs
//!
//! # Usage
//!
//! ```bash
//! # Read a serial port and deliver its lines to a collector
//! linecast ingest --port /dev/ttyUSB0 --server logs.local:14999
//!
//! # Run a collector
//! linecast serve --config configs/linecast.toml
//!
//! # Deliver a persisted log again
//! linecast replay log_koerkana1_4.log --server logs.local:14999
//! ```

mod cmd;
mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linecast_config::Config;

/// Linecast - Reliable delivery of serial device logs
#[derive(Parser, Debug)]
#[command(name = "linecast")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a serial port and deliver its lines to a collector
    Ingest(cmd::ingest::IngestArgs),

    /// Run a collector
    Serve(cmd::serve::ServeArgs),

    /// Deliver a persisted source log to a collector again
    Replay(cmd::replay::ReplayArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.log, cli.log_level.as_deref())?;

    // All roles poll cooperatively on one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Command::Ingest(args) => cmd::ingest::run(args, config).await,
            Command::Serve(args) => cmd::serve::run(args, config).await,
            Command::Replay(args) => cmd::replay::run(args, config).await,
        }
    })
}

/// Load config: explicit path > default paths > built-in defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    let default_paths = [
        PathBuf::from("configs/linecast.toml"),
        PathBuf::from("linecast.toml"),
    ];
    for path in &default_paths {
        if path.exists() {
            return Config::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()));
        }
    }

    Ok(Config::default())
}
