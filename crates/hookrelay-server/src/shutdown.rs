//! Graceful shutdown via `tokio::signal` + `CancellationToken`.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for ctrl-c (or SIGTERM on unix), then cancel `token`.
///
/// The serving loop and every connection-scoped task observe the same
/// token, so one signal drains the whole process.
pub async fn watch_signals(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received");
    token.cancel();
}
