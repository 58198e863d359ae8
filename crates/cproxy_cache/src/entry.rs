use std::time::SystemTime;

use bytes::Bytes;
use http::{
    HeaderMap, StatusCode,
    header::{ETAG, LAST_MODIFIED},
};

/// One cached origin response.
///
/// `headers` is an owned deep copy of the origin header map; nothing outside
/// the entry can mutate it.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub stored_at: SystemTime,
    pub expires_at: SystemTime,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl CacheEntry {
    /// Builds an entry from an origin response, extracting validators.
    pub fn from_response(
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
        stored_at: SystemTime,
        expires_at: SystemTime,
    ) -> Self {
        Self {
            status,
            headers: headers.clone(),
            body,
            stored_at,
            expires_at,
            last_modified: validator(headers, LAST_MODIFIED),
            etag: validator(headers, ETAG),
        }
    }

    /// Fresh while `now` is strictly before `expires_at`.
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }

    pub fn has_validators(&self) -> bool {
        self.last_modified.is_some() || self.etag.is_some()
    }
}

fn validator(headers: &HeaderMap, name: http::header::HeaderName) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
