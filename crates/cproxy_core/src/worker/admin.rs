use cproxy_config::ServerConfig;
use cproxy_http::{
    ProxyResponse,
    responses::{method_not_allowed, not_found, text_response},
};
use cproxy_proxy::{Origin, ProxyEngine};
use http::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdminRoute {
    ClearCache,
    Shutdown,
    /// Under the admin prefix but not a known command.
    Unknown,
}

/// Admin endpoints living under the configured prefix.
#[derive(Debug, Clone)]
pub(crate) struct AdminRoutes {
    prefix: String,
    clear_cache: String,
    shutdown: String,
}

impl AdminRoutes {
    pub(crate) fn from_config(server: &ServerConfig) -> Self {
        Self {
            prefix: server.admin_prefix.clone(),
            clear_cache: server.clear_cache_path(),
            shutdown: server.shutdown_path(),
        }
    }

    /// `None` means the request belongs to the proxy.
    pub(crate) fn match_path(&self, path: &str) -> Option<AdminRoute> {
        if path == self.clear_cache {
            return Some(AdminRoute::ClearCache);
        }
        if path == self.shutdown {
            return Some(AdminRoute::Shutdown);
        }

        let under_prefix = path
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        under_prefix.then_some(AdminRoute::Unknown)
    }

    pub(crate) fn handle<O: Origin>(
        &self,
        route: AdminRoute,
        method: &Method,
        engine: &ProxyEngine<O>,
        shutdown: &CancellationToken,
    ) -> ProxyResponse {
        if route == AdminRoute::Unknown {
            return not_found();
        }
        if *method != Method::POST {
            return method_not_allowed();
        }

        match route {
            AdminRoute::ClearCache => {
                info!(target: "cproxy::admin", "Clear-cache requested");
                engine.clear_cache();
                text_response(StatusCode::OK, "Cache cleared\n")
            }
            AdminRoute::Shutdown => {
                info!(target: "cproxy::admin", "Shutdown requested, initiating graceful shutdown");
                shutdown.cancel();
                text_response(StatusCode::OK, "Shutting down proxy server...\n")
            }
            AdminRoute::Unknown => not_found(),
        }
    }
}
