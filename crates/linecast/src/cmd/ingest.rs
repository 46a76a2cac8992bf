//! Ingest command - serial port to collector

use anyhow::Result;
use clap::Args;
use linecast_client::{
    Ingester, IngesterConfig, OutboundBuffer, OutboundConfig, TcpUplink, TcpUplinkConfig,
    local_source_id,
};
use linecast_config::{Config, IngestConfig};
use linecast_sources::{BootClock, SerialLink};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Ingest command arguments
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Serial device path
    #[arg(short, long)]
    pub port: Option<String>,

    /// Collector request endpoint (host:port)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Port name used in the source id (defaults to the last character of the port path)
    #[arg(long)]
    pub portname: Option<String>,

    /// Keep device timestamps as-is instead of rebuilding wall-clock time
    #[arg(long)]
    pub no_boot_time: bool,
}

impl IngestArgs {
    fn apply(self, mut config: IngestConfig) -> IngestConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(server) = self.server {
            config.server = server;
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if self.portname.is_some() {
            config.portname = self.portname;
        }
        if self.no_boot_time {
            config.boot_time = false;
        }
        config
    }
}

/// Build the uplink settings shared by ingest and replay
pub(crate) fn outbound_parts(config: &IngestConfig, server: &str) -> (TcpUplink, OutboundConfig) {
    let uplink = TcpUplink::new(
        TcpUplinkConfig::new(server)
            .with_connect_timeout(config.connect_timeout)
            .with_write_timeout(config.write_timeout),
    );
    let outbound = OutboundConfig::default()
        .with_ack_timeout(config.ack_timeout)
        .with_retention(config.retention)
        .with_reconnect_interval(config.reconnect_interval, config.reconnect_interval_max);
    (uplink, outbound)
}

/// Run the ingest command
pub async fn run(args: IngestArgs, config: Config) -> Result<()> {
    let config = args.apply(config.ingest);
    if config.server.trim().is_empty() {
        anyhow::bail!("no collector address configured (use --server or [ingest] server)");
    }

    let source_id = local_source_id(&config.effective_portname());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %source_id,
        port = %config.port,
        baud = config.baud,
        server = %config.server,
        boot_time = config.boot_time,
        "linecast ingest starting"
    );

    let serial = SerialLink::new(config.port.clone(), config.baud)
        .with_reopen_delay(config.serial_reopen_delay);
    let clock = if config.boot_time {
        BootClock::new()
    } else {
        BootClock::disabled()
    };
    let (uplink, outbound) = outbound_parts(&config, &config.server);
    let buffer = OutboundBuffer::new(uplink, outbound);
    let ingester_config = IngesterConfig {
        idle_flush: config.idle_flush,
        poll_interval: config.poll_interval,
        read_chunk: config.read_chunk,
    };

    let cancel = CancellationToken::new();
    super::cancel_on_shutdown(cancel.clone());

    Ingester::new(source_id, serial, clock, buffer, ingester_config)
        .run(cancel)
        .await;

    info!("linecast ingest stopped");
    Ok(())
}
