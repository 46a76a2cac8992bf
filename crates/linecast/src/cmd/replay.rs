//! Replay command - deliver a persisted source log again

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use linecast_client::{OutboundBuffer, Replay, ReplayConfig};
use linecast_config::Config;
use linecast_protocol::SourceId;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::ingest::outbound_parts;

/// Replay command arguments
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Persisted log file (log_<source_id>.log)
    pub file: PathBuf,

    /// Collector request endpoint (host:port)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Source id to stamp on the lines instead of the one in the file name
    #[arg(long)]
    pub source: Option<String>,

    /// Lines read from the file per refill
    #[arg(long, default_value_t = 1000)]
    pub chunk_lines: usize,
}

/// Run the replay command
pub async fn run(args: ReplayArgs, config: Config) -> Result<()> {
    let ingest = config.ingest;
    let server = args.server.unwrap_or_else(|| ingest.server.clone());
    if server.trim().is_empty() {
        anyhow::bail!("no collector address configured (use --server or [ingest] server)");
    }

    let (uplink, outbound) = outbound_parts(&ingest, &server);
    let replay_config = ReplayConfig {
        chunk_lines: args.chunk_lines.max(1),
        poll_interval: ingest.poll_interval,
    };
    let replay = Replay::open(
        &args.file,
        args.source.map(SourceId::new),
        OutboundBuffer::new(uplink, outbound),
        replay_config,
    )
    .await
    .with_context(|| format!("failed to start replay of {}", args.file.display()))?;

    info!(
        file = %args.file.display(),
        source = %replay.source_id(),
        server = %server,
        "linecast replay starting"
    );

    let cancel = CancellationToken::new();
    super::cancel_on_shutdown(cancel.clone());

    let snapshot = replay.run(cancel).await.context("replay failed")?;
    info!(
        lines_read = snapshot.lines_read,
        lines_skipped = snapshot.lines_skipped,
        "linecast replay stopped"
    );
    Ok(())
}
