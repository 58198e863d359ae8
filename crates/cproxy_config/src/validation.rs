use std::net::IpAddr;

use http::HeaderName;

use crate::ProxyConfig;

/// Longest freshness lifetime a cache can honour (2^31 s).
pub const MAX_TTL_SECS: u64 = 1 << 31;

/// Upper bound for `origin.timeout_secs` (one day).
pub const MAX_ORIGIN_TIMEOUT_SECS: u64 = 86_400;

/// Typed configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no origin configured (use --origin or origin.url)")]
    MissingOrigin,

    #[error("invalid origin URL '{url}': {reason}")]
    InvalidOrigin { url: String, reason: String },

    #[error("origin must use http or https (got: {0:?})")]
    UnsupportedScheme(String),

    #[error("origin must include a host (got: {0:?})")]
    MissingHost(String),

    #[error("origin must not contain a path (got: {0:?})")]
    OriginHasPath(String),

    #[error("invalid port number: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

pub fn validate_port(port: u16) -> Result<u16, ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(port)
}

/// Validation output for a loaded configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a configuration and return a report of issues.
pub fn validate(cfg: &ProxyConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_server(cfg, &mut report);
    validate_origin(cfg, &mut report);
    validate_cache(cfg, &mut report);

    report
}

fn validate_server(cfg: &ProxyConfig, report: &mut ConfigReport) {
    if let Err(e) = validate_port(cfg.server.port) {
        report.error(e.to_string());
    }

    let host = cfg.server.listen_host.trim();
    if host.parse::<IpAddr>().is_err() && host != "localhost" {
        report.warn(format!(
            "server.listen_host '{host}' is not an IP address; DNS resolution will be used"
        ));
    }

    if cfg.server.auto_shutdown_secs == Some(0) {
        report.error("server.auto_shutdown_secs must be greater than 0 when set");
    }
}

fn validate_origin(cfg: &ProxyConfig, report: &mut ConfigReport) {
    if let Err(e) = cfg.origin.target() {
        report.error(e.to_string());
    }

    for name in &cfg.origin.hop_by_hop_headers {
        if HeaderName::from_bytes(name.trim().as_bytes()).is_err() {
            report.error(format!("origin.hop_by_hop_headers entry '{name}' is not a header name"));
        }
    }

    if cfg.origin.timeout_secs > MAX_ORIGIN_TIMEOUT_SECS {
        report.error(format!(
            "origin.timeout_secs is {}; must be at most {MAX_ORIGIN_TIMEOUT_SECS}",
            cfg.origin.timeout_secs
        ));
    } else if cfg.origin.timeout_secs > 300 {
        report.warn(format!(
            "origin.timeout_secs is {}; slow origins will hold client connections that long",
            cfg.origin.timeout_secs
        ));
    }
}

fn validate_cache(cfg: &ProxyConfig, report: &mut ConfigReport) {
    if cfg.cache.default_ttl_secs == 0 {
        report.warn(
            "cache.default_ttl_secs is 0; responses without freshness headers are stale immediately",
        );
    }

    if cfg.cache.default_ttl_secs > MAX_TTL_SECS {
        report.error(format!(
            "cache.default_ttl_secs is {}; must be at most {MAX_TTL_SECS}",
            cfg.cache.default_ttl_secs
        ));
    }

    if HeaderName::from_bytes(cfg.cache.status_header.trim().as_bytes()).is_err() {
        report.error(format!(
            "cache.status_header '{}' is not a valid header name",
            cfg.cache.status_header
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MAX_ORIGIN_TIMEOUT_SECS, MAX_TTL_SECS, validate, validate_port};
    use crate::ProxyConfig;

    fn config_with_origin(url: &str) -> ProxyConfig {
        let mut cfg = ProxyConfig::default();
        cfg.origin.url = url.to_string();
        cfg
    }

    #[test]
    fn default_config_without_origin_is_an_error() {
        let report = validate(&ProxyConfig::default());
        assert!(report.has_errors());
        assert!(report.format().contains("no origin configured"));
    }

    #[test]
    fn valid_origin_passes() {
        let report = validate(&config_with_origin("http://localhost:3000"));
        assert!(report.is_ok(), "{}", report.format());
    }

    #[test]
    fn port_zero_is_rejected() {
        let mut cfg = config_with_origin("http://localhost:3000");
        cfg.server.port = 0;
        let report = validate(&cfg);
        assert!(report.has_errors());
        assert!(matches!(validate_port(0), Err(ConfigError::InvalidPort(0))));
        assert_eq!(validate_port(8080).expect("valid"), 8080);
    }

    #[test]
    fn zero_ttl_is_a_warning() {
        let mut cfg = config_with_origin("http://localhost:3000");
        cfg.cache.default_ttl_secs = 0;
        let report = validate(&cfg);
        assert!(report.is_ok());
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn oversized_ttl_and_timeout_are_errors() {
        let mut cfg = config_with_origin("http://localhost:3000");
        cfg.cache.default_ttl_secs = u64::MAX;
        cfg.origin.timeout_secs = u64::MAX;
        let report = validate(&cfg);
        assert_eq!(report.errors().len(), 2);
        assert!(report.format().contains("cache.default_ttl_secs"));
        assert!(report.format().contains("origin.timeout_secs"));

        cfg.cache.default_ttl_secs = MAX_TTL_SECS;
        cfg.origin.timeout_secs = MAX_ORIGIN_TIMEOUT_SECS;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn bad_hop_by_hop_entry_is_an_error() {
        let mut cfg = config_with_origin("http://localhost:3000");
        cfg.origin.hop_by_hop_headers.push("bad header".into());
        assert!(validate(&cfg).has_errors());
    }
}
