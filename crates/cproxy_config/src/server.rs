use serde::Deserialize;

// =======================================================
// SERVER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_host: String,
    pub port: u16,

    /// Upper bound of concurrently served client connections.
    pub max_connections: u16,

    // Lifecycle (seconds)
    pub shutdown_timeout_secs: u64,
    /// Shut down on its own after this long. Off when unset.
    pub auto_shutdown_secs: Option<u64>,

    /// Path prefix of the admin endpoints (`<prefix>/clear-cache`, `<prefix>/shutdown`).
    pub admin_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".into(),
            port: 8080,
            max_connections: 1024,
            shutdown_timeout_secs: 15,
            auto_shutdown_secs: None,
            admin_prefix: "/__cproxy".into(),
        }
    }
}

impl ServerConfig {
    pub fn listen(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_connections(&self) -> u16 {
        self.max_connections
    }

    pub fn shutdown_timeout_secs(&self) -> u64 {
        self.shutdown_timeout_secs
    }

    pub fn auto_shutdown_secs(&self) -> Option<u64> {
        self.auto_shutdown_secs
    }

    pub fn clear_cache_path(&self) -> String {
        format!("{}/clear-cache", self.admin_prefix)
    }

    pub fn shutdown_path(&self) -> String {
        format!("{}/shutdown", self.admin_prefix)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &ServerConfig) {
        if self.listen_host.trim().is_empty() {
            self.listen_host = defaults.listen_host.clone();
        }
        if self.max_connections == 0 {
            self.max_connections = defaults.max_connections;
        }
        if self.shutdown_timeout_secs == 0 {
            self.shutdown_timeout_secs = defaults.shutdown_timeout_secs;
        }
        let trimmed = self.admin_prefix.trim().trim_matches('/');
        self.admin_prefix = if trimmed.is_empty() {
            defaults.admin_prefix.clone()
        } else {
            format!("/{trimmed}")
        };
    }
}
