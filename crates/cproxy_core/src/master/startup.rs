use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use cproxy_proxy::Origin;

use super::Master;

impl<O: Origin + 'static> Master<O> {
    pub(super) fn log_startup(&self) {
        info!(target: "cproxy::master", "Starting CPROXY");
        self.cfg.log_summary();
    }

    pub(super) fn init_semaphore(&self) -> Arc<Semaphore> {
        let max_conns = usize::from(self.cfg.server().max_connections()).max(1);
        let semaphore = Arc::new(Semaphore::new(max_conns));
        info!(
            target: "cproxy::master",
            max_conns,
            "Connection semaphore initialized"
        );
        semaphore
    }
}
