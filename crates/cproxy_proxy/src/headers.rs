use std::collections::HashSet;

use cproxy_cache::CacheEntry;
use http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{CONNECTION, CONTENT_LENGTH, IF_MODIFIED_SINCE, IF_NONE_MATCH, TRANSFER_ENCODING, WARNING},
};
use tracing::warn;

/// Request headers a proxy must not forward to the origin.
#[derive(Debug, Clone)]
pub struct HopByHop {
    names: Vec<HeaderName>,
}

impl HopByHop {
    /// Invalid names are logged and skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref().trim();
                match HeaderName::from_bytes(name.as_bytes()) {
                    Ok(h) => Some(h),
                    Err(_) => {
                        warn!(target: "cproxy::proxy", header = %name, "Ignoring invalid hop-by-hop header name");
                        None
                    }
                }
            })
            .collect();

        Self { names }
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.names.contains(name)
    }
}

impl Default for HopByHop {
    fn default() -> Self {
        Self::from_names(cproxy_config::DEFAULT_HOP_BY_HOP)
    }
}

/// Copies client request headers for the origin request.
///
/// Drops:
/// - the configured hop-by-hop set
/// - any header named by a `Connection` token
pub fn forward_request_headers(src: &HeaderMap, hop_by_hop: &HopByHop) -> HeaderMap {
    let connection_tokens = collect_connection_tokens(src);
    let mut out = HeaderMap::with_capacity(src.len());

    for (name, value) in src {
        if hop_by_hop.contains(name) || connection_tokens.contains(name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out
}

/// Origin (or cached) headers as relayed to the client.
///
/// Same filtering as requests, plus framing headers: hyper re-derives
/// `Content-Length` / `Transfer-Encoding` from the buffered body.
pub fn relay_response_headers(src: &HeaderMap, hop_by_hop: &HopByHop) -> HeaderMap {
    let mut out = forward_request_headers(src, hop_by_hop);
    out.remove(CONTENT_LENGTH);
    out.remove(TRANSFER_ENCODING);
    out
}

/// `If-Modified-Since` / `If-None-Match` from the entry's validators.
pub fn conditional_headers(entry: &CacheEntry) -> HeaderMap {
    let mut out = HeaderMap::new();

    if let Some(value) = entry.last_modified.as_deref().and_then(valid_value) {
        out.insert(IF_MODIFIED_SINCE, value);
    }
    if let Some(value) = entry.etag.as_deref().and_then(valid_value) {
        out.insert(IF_NONE_MATCH, value);
    }

    out
}

/// Marks a response as served stale after a failed revalidation.
pub fn add_stale_warning(headers: &mut HeaderMap) {
    headers.insert(
        WARNING,
        HeaderValue::from_static("111 - \"Revalidation Failed\""),
    );
}

fn valid_value(raw: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(raw).ok()
}

fn collect_connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| {
            let token = token.trim().trim_matches(|c| c == '"' || c == '\'');
            if token.is_empty() {
                None
            } else {
                Some(token.to_ascii_lowercase())
            }
        })
        .collect()
}
