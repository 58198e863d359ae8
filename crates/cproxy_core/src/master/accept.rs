use std::{net::SocketAddr, sync::Arc, time::Duration};

use cproxy_proxy::Origin;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::worker::{ConnectionContext, serve_connection};

/// Pause after a failed `accept()` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    info!(
        target: "cproxy::master",
        listen = %listen_addr,
        "Binding listener"
    );

    match TcpListener::bind(listen_addr).await {
        Ok(listener) => {
            info!(
                target: "cproxy::master",
                listen = %listen_addr,
                "Bind() successful"
            );
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "cproxy::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(e.into())
        }
    }
}

struct AcceptedConn {
    stream: TcpStream,
    addr: SocketAddr,
    permit: OwnedSemaphorePermit,
}

async fn accept_with_permit(
    listener: &TcpListener,
    semaphore: &Arc<Semaphore>,
) -> anyhow::Result<AcceptedConn> {
    // Permit first: at the limit, pending clients wait in the backlog.
    let permit = semaphore.clone().acquire_owned().await?;
    let (stream, addr) = listener.accept().await?;

    debug!(
        target: "cproxy::master",
        client_addr = %addr,
        available_permits = semaphore.available_permits(),
        "Connection accepted"
    );

    Ok(AcceptedConn {
        stream,
        addr,
        permit,
    })
}

/// Accepts until `shutdown` fires. Connection tasks are tracked so the
/// caller can wait for them to drain.
#[instrument(
    skip_all,
    fields(available_permits = semaphore.available_permits())
)]
pub(crate) async fn accept_loop<O: Origin + 'static>(
    listener: &TcpListener,
    semaphore: Arc<Semaphore>,
    tracker: &TaskTracker,
    ctx: Arc<ConnectionContext<O>>,
    shutdown: CancellationToken,
) {
    info!(
        target: "cproxy::master",
        listen = ?listener.local_addr().ok(),
        "Accept loop started"
    );

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = accept_with_permit(listener, &semaphore) => accepted,
        };

        let AcceptedConn {
            stream,
            addr,
            permit,
        } = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                warn!(
                    target: "cproxy::master",
                    error = ?e,
                    "Failed to accept connection"
                );
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        let span = tracing::info_span!("connection", client_addr = %addr);

        tracker.spawn(
            async move {
                let _permit = permit;

                match serve_connection(stream, ctx, shutdown).await {
                    Ok(()) => debug!(
                        target: "cproxy::worker",
                        "Connection handled successfully"
                    ),
                    Err(e) => debug!(
                        target: "cproxy::worker",
                        error = ?e,
                        "Connection closed with error"
                    ),
                }
            }
            .instrument(span),
        );
    }

    info!(target: "cproxy::master", "Accept loop stopped");
}
