use http::{HeaderMap, Method, StatusCode};

use crate::cache_control;

pub struct CachePolicy;

impl CachePolicy {
    /// Only `200` answers to `GET` without `no-store` are stored.
    pub fn is_cacheable(method: &Method, status: StatusCode, response_headers: &HeaderMap) -> bool {
        *method == Method::GET
            && status == StatusCode::OK
            && !cache_control::has_directive(response_headers, "no-store")
    }

    /// Client asked for origin confirmation (`Cache-Control: no-cache`).
    pub fn requires_revalidation(request_headers: &HeaderMap) -> bool {
        cache_control::has_directive(request_headers, "no-cache")
    }

    pub fn default_ttl() -> std::time::Duration {
        std::time::Duration::from_secs(5 * 60)
    }
}
