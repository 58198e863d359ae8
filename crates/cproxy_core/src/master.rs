use std::{sync::Arc, time::Duration};

use anyhow::Context;
use cproxy_config::ProxyConfig;
use cproxy_proxy::{HttpOrigin, Origin, ProxyEngine};
use tokio::net::TcpListener;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, instrument, warn};

use crate::worker::ConnectionContext;

mod accept;
mod shutdown;
mod startup;

use accept::{accept_loop, bind_listener};

/// Owns the listener side of one proxy instance.
///
/// Flujo:
/// - bind
/// - accept loop (una task por conexion, acotado por semaforo)
/// - shutdown: deja de aceptar, drena conexiones, limpia la cache una vez
pub struct Master<O = HttpOrigin> {
    cfg: Arc<ProxyConfig>,
    engine: Arc<ProxyEngine<O>>,
    shutdown: CancellationToken,
}

impl Master<HttpOrigin> {
    pub fn new(cfg: ProxyConfig) -> anyhow::Result<Self> {
        let engine = ProxyEngine::from_config(&cfg).context("invalid origin configuration")?;
        Ok(Self::with_engine(cfg, engine))
    }
}

impl<O: Origin + 'static> Master<O> {
    pub fn with_engine(cfg: ProxyConfig, engine: ProxyEngine<O>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            engine: Arc::new(engine),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn engine(&self) -> Arc<ProxyEngine<O>> {
        self.engine.clone()
    }

    /// Cancelling this token starts the graceful shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Binds the configured address, installs signal handlers and serves
    /// until shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        self.log_startup();

        let listen = self.cfg.server().listen();
        let listener = bind_listener(&listen).await?;

        shutdown::spawn_signal_listener(self.shutdown.clone());
        if let Some(secs) = self.cfg.server().auto_shutdown_secs() {
            shutdown::spawn_auto_shutdown(self.shutdown.clone(), Duration::from_secs(secs));
        }

        self.serve(listener).await
    }

    /// Serves on an already bound listener until the shutdown token fires.
    #[instrument(skip(self, listener), fields(origin = %self.cfg.origin().url()))]
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let semaphore = self.init_semaphore();
        let tracker = TaskTracker::new();
        let ctx = Arc::new(ConnectionContext::new(
            self.engine.clone(),
            self.cfg.clone(),
            self.shutdown.clone(),
        ));

        accept_loop(&listener, semaphore, &tracker, ctx, self.shutdown.clone()).await;
        drop(listener);

        tracker.close();
        let grace = Duration::from_secs(self.cfg.server().shutdown_timeout_secs());
        info!(
            target: "cproxy::master",
            in_flight = tracker.len(),
            grace_secs = grace.as_secs(),
            "Waiting for in-flight connections"
        );
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!(
                target: "cproxy::master",
                in_flight = tracker.len(),
                "Shutdown timeout elapsed with connections still open"
            );
        }

        self.engine.clear_cache();
        info!(target: "cproxy::master", "Proxy stopped");
        Ok(())
    }
}
