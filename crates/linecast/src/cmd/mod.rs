//! Command implementations for the Linecast CLI

pub mod ingest;
pub mod replay;
pub mod serve;

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on Ctrl+C or SIGTERM
pub fn cancel_on_shutdown(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        tracing::info!("shutdown signal received");
        cancel.cancel();
    });
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
