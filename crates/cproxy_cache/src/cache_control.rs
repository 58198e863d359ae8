//! `Cache-Control` directive parsing.

use http::{HeaderMap, header::CACHE_CONTROL};

/// Single directive: lowercase name plus optional raw value (quotes stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub value: Option<String>,
}

/// Collects every directive from every `Cache-Control` field line, in order.
///
/// Field values that are not valid visible ASCII are skipped.
pub fn directives(headers: &HeaderMap) -> Vec<Directive> {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(parse_directives)
        .collect()
}

/// Splits one header value on commas into directives.
pub fn parse_directives(value: &str) -> impl Iterator<Item = Directive> + '_ {
    value.split(',').filter_map(|raw| {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let (name, value) = match raw.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim().trim_matches('"').to_string())),
            None => (raw, None),
        };

        if name.is_empty() {
            return None;
        }

        Some(Directive {
            name: name.to_ascii_lowercase(),
            value,
        })
    })
}

/// True if any `Cache-Control` line carries the directive `name`.
pub fn has_directive(headers: &HeaderMap, name: &str) -> bool {
    directives(headers)
        .iter()
        .any(|d| d.name.eq_ignore_ascii_case(name))
}

/// First syntactically valid `max-age` in seconds.
pub fn max_age(headers: &HeaderMap) -> Option<u64> {
    directives(headers)
        .into_iter()
        .filter(|d| d.name == "max-age")
        .find_map(|d| delta_seconds(d.value.as_deref()?))
}

/// Non-negative integer seconds; overlong digit strings saturate.
fn delta_seconds(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(raw.parse::<u64>().unwrap_or(u64::MAX))
}
