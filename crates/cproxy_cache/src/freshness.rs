//! Freshness lifetime computation from origin response headers.
//!
//! Rules, first match wins:
//! 1. `Cache-Control: max-age=N`  -> reference + N
//! 2. `Expires: <http-date>`      -> that date (may already be in the past)
//! 3. `Date` > `Last-Modified`    -> reference + 10% of (Date - Last-Modified)
//! 4. otherwise                   -> reference + default TTL
//!
//! Unparseable values never fail; they just fall through to the next rule.

use std::time::{Duration, SystemTime};

use http::{
    HeaderMap,
    header::{DATE, EXPIRES, LAST_MODIFIED},
};

use crate::cache_control;

/// Largest delta-seconds value honoured (2^31).
pub const MAX_DELTA_SECONDS: u64 = 1 << 31;

/// Fraction of `Date - Last-Modified` used as heuristic lifetime.
pub const HEURISTIC_FRACTION: f64 = 0.10;

/// Expiry instant for a response received at `reference`.
///
/// `max-age` and the default TTL are capped at [`MAX_DELTA_SECONDS`], so for
/// `max-age=N` with N above 2^31 the result is `reference + 2^31 s`, not
/// `reference + N`. Larger values are treated as "never expires" per RFC 9111.
pub fn compute_expiry(headers: &HeaderMap, reference: SystemTime, default_ttl: Duration) -> SystemTime {
    if let Some(max_age) = cache_control::max_age(headers) {
        return saturating_add(reference, Duration::from_secs(max_age));
    }

    if let Some(expires) = header_date(headers, EXPIRES) {
        return expires;
    }

    if let Some(lifetime) = heuristic_lifetime(headers) {
        return saturating_add(reference, lifetime);
    }

    saturating_add(reference, default_ttl)
}

fn saturating_add(reference: SystemTime, lifetime: Duration) -> SystemTime {
    let capped = lifetime.min(Duration::from_secs(MAX_DELTA_SECONDS));
    reference.checked_add(capped).unwrap_or(reference)
}

/// 10% of the resource age at response time, if `Date` and `Last-Modified`
/// both parse and `Date` is strictly later.
fn heuristic_lifetime(headers: &HeaderMap) -> Option<Duration> {
    let date = header_date(headers, DATE)?;
    let last_modified = header_date(headers, LAST_MODIFIED)?;

    let age = date.duration_since(last_modified).ok()?;
    if age.is_zero() {
        return None;
    }

    Some(age.mul_f64(HEURISTIC_FRACTION))
}

fn header_date(headers: &HeaderMap, name: http::header::HeaderName) -> Option<SystemTime> {
    let raw = headers.get(name)?.to_str().ok()?;
    httpdate::parse_http_date(raw.trim()).ok()
}
