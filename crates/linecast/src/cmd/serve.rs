//! Serve command - Run a collector
//!
//! Starts whichever of the request endpoint, the publish endpoint, the
//! upstream subscription and the log store are configured, and runs the
//! collector loop over them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use linecast_config::{CollectorConfig, Config};
use linecast_pipeline::Collector;
use linecast_sinks::{LogStore, LogStoreConfig};
use linecast_sources::RequestListener;
use linecast_tap::{PublishServer, Publisher, SubscriberManager, UpstreamConfig, UpstreamSubscriber};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Queue between the network tasks and the collector loop
const INPUT_QUEUE: usize = 1024;

/// Serve command arguments
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Request endpoint ingesters connect to ("none" disables)
    #[arg(long)]
    pub listen: Option<String>,

    /// Publish endpoint subscribers connect to ("none" disables)
    #[arg(long)]
    pub publish: Option<String>,

    /// Publish endpoint of an upstream collector to chain from
    #[arg(long)]
    pub subscribe: Option<String>,

    /// Write received lines to per-source log files
    #[arg(long)]
    pub persist: bool,

    /// Directory for per-source log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl ServeArgs {
    fn apply(self, mut config: CollectorConfig) -> CollectorConfig {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(publish) = self.publish {
            config.publish = publish;
        }
        if self.subscribe.is_some() {
            config.subscribe = self.subscribe;
        }
        if self.persist {
            config.persist = true;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = dir;
        }
        config
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs, config: Config) -> Result<()> {
    let config = args.apply(config.collector);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = config.listen_addr().unwrap_or("none"),
        publish = config.publish_addr().unwrap_or("none"),
        subscribe = config.subscribe_addr().unwrap_or("none"),
        persist = config.persist,
        "linecast collector starting"
    );

    let cancel = CancellationToken::new();
    super::cancel_on_shutdown(cancel.clone());

    let (collector, handles) = start_collector(&config, cancel.clone()).await?;

    let result = collector.run(cancel.clone()).await;
    cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "collector task panicked during shutdown");
        }
    }
    result.context("collector failed")?;

    info!("linecast collector stopped");
    Ok(())
}

/// Bind every configured endpoint and wire them to a collector
///
/// Network tasks are spawned immediately; the returned collector still
/// has to be run.
pub async fn start_collector(
    config: &CollectorConfig,
    cancel: CancellationToken,
) -> Result<(Collector, Vec<JoinHandle<()>>)> {
    let mut collector = Collector::new();
    let mut handles = Vec::new();

    if let Some(address) = config.listen_addr() {
        let (tx, rx) = mpsc::channel(INPUT_QUEUE);
        let listener = RequestListener::bind(address, tx)
            .await
            .with_context(|| format!("failed to bind request endpoint {address}"))?;
        collector = collector.with_inbound(rx);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = listener.run(cancel).await {
                warn!(error = %e, "request endpoint failed");
            }
        }));
    }

    if let Some(address) = config.publish_addr() {
        let publisher = Publisher::new(SubscriberManager::new(config.subscriber_queue));
        let server = PublishServer::bind(address, publisher.clone())
            .await
            .with_context(|| format!("failed to bind publish endpoint {address}"))?;
        collector = collector.with_publisher(publisher);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = server.run(cancel).await {
                warn!(error = %e, "publish endpoint failed");
            }
        }));
    }

    if let Some(address) = config.subscribe_addr() {
        let (tx, rx) = mpsc::channel(INPUT_QUEUE);
        let upstream = UpstreamSubscriber::new(
            UpstreamConfig::new(address).with_reconnect_interval(
                config.subscribe_reconnect_interval,
                config.subscribe_reconnect_interval_max,
            ),
            tx,
        );
        collector = collector.with_upstream(rx);
        handles.push(tokio::spawn(upstream.run(cancel.clone())));
    }

    if config.persist {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("failed to create log directory {}", config.log_dir.display())
        })?;
        collector = collector.with_store(LogStore::new(
            LogStoreConfig::default()
                .with_dir(&config.log_dir)
                .with_backup_count(config.backup_count),
        ));
    }

    Ok((collector, handles))
}
