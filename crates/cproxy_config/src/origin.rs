use std::{fmt, time::Duration};

use http::Uri;
use serde::Deserialize;

use crate::validation::ConfigError;

/// Headers never forwarded from client to origin.
pub const DEFAULT_HOP_BY_HOP: [&str; 9] = [
    "Host",
    "Connection",
    "Keep-Alive",
    "Proxy-Authenticate",
    "Proxy-Authorization",
    "TE",
    "Trailers",
    "Transfer-Encoding",
    "Upgrade",
];

// =======================================================
// ORIGIN CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the origin, e.g. `http://example.com` (no path).
    pub url: String,
    /// Bound on connect + response head (and body read) per origin call.
    pub timeout_secs: u64,
    pub hop_by_hop_headers: Vec<String>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 10,
            hop_by_hop_headers: DEFAULT_HOP_BY_HOP.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl OriginConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn hop_by_hop_headers(&self) -> &[String] {
        &self.hop_by_hop_headers
    }

    /// Parses and validates `url` into a connectable target.
    pub fn target(&self) -> Result<OriginTarget, ConfigError> {
        OriginTarget::parse(&self.url)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &OriginConfig) {
        if self.timeout_secs == 0 {
            self.timeout_secs = defaults.timeout_secs;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginScheme {
    Http,
    Https,
}

impl OriginScheme {
    pub fn default_port(self) -> u16 {
        match self {
            OriginScheme::Http => 80,
            OriginScheme::Https => 443,
        }
    }
}

impl fmt::Display for OriginScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginScheme::Http => f.write_str("http"),
            OriginScheme::Https => f.write_str("https"),
        }
    }
}

/// A validated origin: scheme, host and port, no path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginTarget {
    pub scheme: OriginScheme,
    /// Host without IPv6 brackets, suitable for DNS / TLS server name.
    pub host: String,
    pub port: u16,
    /// Value for the `Host` header (`host[:port]` as written in the URL).
    pub authority: String,
}

impl OriginTarget {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingOrigin);
        }

        let uri: Uri = raw.parse().map_err(|e: http::uri::InvalidUri| ConfigError::InvalidOrigin {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match uri.scheme_str() {
            Some("http") => OriginScheme::Http,
            Some("https") => OriginScheme::Https,
            Some(other) => {
                return Err(ConfigError::UnsupportedScheme(other.to_string()));
            }
            None => {
                return Err(ConfigError::InvalidOrigin {
                    url: raw.to_string(),
                    reason: "missing scheme (expected http:// or https://)".into(),
                });
            }
        };

        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .ok_or_else(|| ConfigError::MissingHost(raw.to_string()))?;

        let host = uri
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::MissingHost(raw.to_string()))?;

        let path = uri.path();
        if !path.is_empty() && path != "/" {
            return Err(ConfigError::OriginHasPath(path.to_string()));
        }
        if uri.query().is_some() {
            return Err(ConfigError::OriginHasPath(format!("?{}", uri.query().unwrap_or(""))));
        }

        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }

        Ok(Self {
            scheme,
            host,
            port,
            authority,
        })
    }
}

impl fmt::Display for OriginTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
