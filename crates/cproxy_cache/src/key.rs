use std::fmt;

use http::Uri;

/// Cache key: request path plus query string.
///
/// The method is deliberately not part of the key; `GET /a` and `HEAD /a`
/// share one entry.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(path_and_query: &str) -> Self {
        if path_and_query.is_empty() {
            return Self("/".to_string());
        }
        Self(path_and_query.to_string())
    }

    pub fn from_uri(uri: &Uri) -> Self {
        let pq = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        Self::new(pq)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
