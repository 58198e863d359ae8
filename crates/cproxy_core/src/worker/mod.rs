//! Per-connection HTTP/1.1 handler.
//!
//! Each request is either an admin command (clear cache, shutdown) or goes
//! through the caching engine.

use std::{convert::Infallible, pin::pin, sync::Arc};

use anyhow::Context;
use bytes::Bytes;
use cproxy_config::ProxyConfig;
use cproxy_proxy::{Origin, ProxyEngine};
use http::{HeaderName, Request, Response};
use http_body_util::Full;
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

mod admin;
mod request;

use admin::AdminRoutes;
use request::{into_hyper_response, read_proxy_request};

/// Everything a connection task needs, shared by all of them.
pub struct ConnectionContext<O> {
    engine: Arc<ProxyEngine<O>>,
    admin: AdminRoutes,
    status_header: Option<HeaderName>,
    shutdown: CancellationToken,
}

impl<O: Origin + 'static> ConnectionContext<O> {
    pub fn new(engine: Arc<ProxyEngine<O>>, cfg: Arc<ProxyConfig>, shutdown: CancellationToken) -> Self {
        let status_header = match HeaderName::from_bytes(cfg.cache().status_header().as_bytes()) {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(
                    target: "cproxy::worker",
                    header = %cfg.cache().status_header(),
                    error = %e,
                    "Invalid cache status header name; status will not be reported"
                );
                None
            }
        };

        Self {
            engine,
            admin: AdminRoutes::from_config(cfg.server()),
            status_header,
            shutdown,
        }
    }

    /// One request, one response. Never fails: errors become status codes.
    async fn dispatch(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let hop_by_hop = self.engine.hop_by_hop();

        if let Some(route) = self.admin.match_path(req.uri().path()) {
            let res = self.admin.handle(route, req.method(), &self.engine, &self.shutdown);
            return into_hyper_response(res, hop_by_hop, self.status_header.as_ref());
        }

        let res = match read_proxy_request(req).await {
            Ok(proxy_req) => self.engine.handle(proxy_req).await,
            Err(res) => res,
        };

        into_hyper_response(res, hop_by_hop, self.status_header.as_ref())
    }
}

/// Serves one client connection until it closes or shutdown is requested.
///
/// On shutdown the in-flight request is allowed to finish before the
/// connection is closed.
pub async fn serve_connection<O: Origin + 'static>(
    stream: TcpStream,
    ctx: Arc<ConnectionContext<O>>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let service = service_fn(move |req: Request<Incoming>| {
        let ctx = ctx.clone();
        async move { Ok::<_, Infallible>(ctx.dispatch(req).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    let mut conn = pin!(conn);

    tokio::select! {
        res = conn.as_mut() => res.context("HTTP/1 connection error")?,
        _ = shutdown.cancelled() => {
            debug!(target: "cproxy::worker", "Shutdown requested, draining connection");
            conn.as_mut().graceful_shutdown();
            conn.await.context("HTTP/1 connection error during shutdown")?;
        }
    }

    Ok(())
}
