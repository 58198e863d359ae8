use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::validation::{ConfigError, ConfigReport, validate};
use crate::{CacheConfig, LogConfig, OriginConfig, ServerConfig};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cproxy.toml";

/// Prefix of environment overrides, e.g. `CPROXY__ORIGIN__URL`.
pub const ENV_PREFIX: &str = "CPROXY";

// =======================================================
// PROXY CONFIG (main config)
// =======================================================
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub origin: OriginConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl ProxyConfig {
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn origin(&self) -> &OriginConfig {
        &self.origin
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub fn log(&self) -> &LogConfig {
        &self.log
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    /// Loads `file_name` (TOML) then `CPROXY__*` environment overrides.
    ///
    /// A missing file is only an error when `required` is set.
    pub fn load(file_name: &Path, required: bool) -> Result<Self, ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::from(file_name).format(config::FileFormat::Toml).required(required))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let mut cfg: ProxyConfig = built.try_deserialize()?;
        cfg.apply_defaults();
        Ok(cfg)
    }

    /// Parses TOML text without consulting the environment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;

        let mut cfg: ProxyConfig = built.try_deserialize()?;
        cfg.apply_defaults();
        Ok(cfg)
    }

    /// CLI values win over file and environment.
    pub fn apply_overrides(&mut self, port: Option<u16>, origin: Option<&str>) {
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(origin) = origin {
            self.origin.url = origin.trim().to_string();
        }
    }

    fn apply_defaults(&mut self) {
        let def_server = ServerConfig::default();
        self.server.apply_defaults_from(&def_server);

        let def_origin = OriginConfig::default();
        self.origin.apply_defaults_from(&def_origin);

        let def_cache = CacheConfig::default();
        self.cache.apply_defaults_from(&def_cache);

        let def_log = LogConfig::default();
        self.log.apply_defaults_from(&def_log);
    }

    pub fn log_summary(&self) {
        info!(
            target: "cproxy::config",
            listen = %self.server.listen(),
            max_connections = self.server.max_connections,
            shutdown_timeout_secs = self.server.shutdown_timeout_secs,
            auto_shutdown_secs = ?self.server.auto_shutdown_secs,
            admin_prefix = %self.server.admin_prefix,
            "Server configuration"
        );
        info!(
            target: "cproxy::config",
            origin = %self.origin.url,
            timeout_secs = self.origin.timeout_secs,
            hop_by_hop = ?self.origin.hop_by_hop_headers,
            "Origin configuration"
        );
        info!(
            target: "cproxy::config",
            default_ttl_secs = self.cache.default_ttl_secs,
            status_header = %self.cache.status_header,
            "Cache configuration"
        );
    }
}
