use std::time::Duration;

use serde::Deserialize;

// =======================================================
// CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness lifetime when the origin gives no usable hint.
    pub default_ttl_secs: u64,
    /// Response header carrying MISS / HIT / stale fallback.
    pub status_header: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 5 * 60,
            status_header: "X-Cache-Status".into(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn status_header(&self) -> &str {
        &self.status_header
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &CacheConfig) {
        if self.status_header.trim().is_empty() {
            self.status_header = defaults.status_header.clone();
        }
    }
}
