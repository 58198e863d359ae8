use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `token` on Ctrl+C (and SIGTERM on unix).
pub(super) fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            signal = wait_for_signal() => {
                info!(target: "cproxy::master", signal, "Shutdown signal received");
                token.cancel();
            }
        }
    });
}

/// Cancels `token` once `after` has elapsed.
pub(super) fn spawn_auto_shutdown(token: CancellationToken, after: Duration) {
    info!(
        target: "cproxy::master",
        after_secs = after.as_secs(),
        "Auto-shutdown armed"
    );
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(after) => {
                info!(target: "cproxy::master", "Auto-shutdown timer fired");
                token.cancel();
            }
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(target: "cproxy::master", error = ?e, "Failed to install SIGTERM handler");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        name = ctrl_c() => name,
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "cproxy::master", error = ?e, "Failed to listen for Ctrl+C");
        // Without a handler only the other triggers can stop the server.
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
