pub mod exchange;
pub mod responses;

pub use exchange::{CacheStatus, ProxyRequest, ProxyResponse};
