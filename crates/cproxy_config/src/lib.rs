//! Configuration for the caching proxy: models, loading and validation.

pub mod cache;
pub mod log;
pub mod origin;
pub mod proxy;
pub mod server;
pub mod validation;

pub use cache::CacheConfig;
pub use log::LogConfig;
pub use origin::{DEFAULT_HOP_BY_HOP, OriginConfig, OriginScheme, OriginTarget};
pub use proxy::{DEFAULT_CONFIG_FILE, ProxyConfig};
pub use server::ServerConfig;
pub use validation::{ConfigError, ConfigReport, validate_port};
