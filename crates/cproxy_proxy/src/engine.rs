use std::time::SystemTime;

use bytes::Bytes;
use cproxy_cache::{CacheEntry, CacheKey, CachePolicy, CacheStore};
use cproxy_config::{ConfigError, ProxyConfig};
use cproxy_http::{
    CacheStatus, ProxyRequest, ProxyResponse,
    responses::{bad_gateway, internal_error},
};
use http::Method;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::OriginError,
    headers::{HopByHop, add_stale_warning, conditional_headers, forward_request_headers},
    origin::{HttpOrigin, Origin, OriginRequest, OriginResponse},
};

/// =======================================================
/// PROXY ENGINE
/// =======================================================
///
/// Decide, por request, entre:
/// - HIT (entrada fresca)
/// - revalidacion condicional (entrada stale o `no-cache`)
/// - MISS (ir al origin y quizas guardar)
///
/// The store lock is never held across an origin call: entries are
/// snapshotted, the lock released, and the result written back afterwards.
pub struct ProxyEngine<O = HttpOrigin> {
    store: CacheStore,
    origin: O,
    hop_by_hop: HopByHop,
}

/// What a revalidation attempt ended with.
enum Revalidation {
    /// Answer is ready (refreshed HIT, stale fallback or local error).
    Served(ProxyResponse),
    /// Origin sent something other than 304; handled as a MISS.
    Replaced(OriginResponse),
}

impl ProxyEngine<HttpOrigin> {
    pub fn from_config(cfg: &ProxyConfig) -> Result<Self, ConfigError> {
        let origin = HttpOrigin::from_config(cfg.origin())?;
        let store = CacheStore::new(cfg.cache().default_ttl());
        let hop_by_hop = HopByHop::from_names(cfg.origin().hop_by_hop_headers());

        Ok(Self::new(store, origin, hop_by_hop))
    }
}

impl<O: Origin> ProxyEngine<O> {
    pub fn new(store: CacheStore, origin: O, hop_by_hop: HopByHop) -> Self {
        Self {
            store,
            origin,
            hop_by_hop,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn origin(&self) -> &O {
        &self.origin
    }

    pub fn hop_by_hop(&self) -> &HopByHop {
        &self.hop_by_hop
    }

    /// Drops every cached entry. Idempotent.
    pub fn clear_cache(&self) {
        let dropped = self.store.len();
        self.store.clear_all();
        info!(target: "cproxy::proxy", dropped, "Cache cleared");
    }

    /// Entry point: exactly one response per request.
    #[instrument(skip(self, req), fields(method = %req.method, path = %req.path_and_query()))]
    pub async fn handle(&self, req: ProxyRequest) -> ProxyResponse {
        let key = CacheKey::from_uri(&req.uri);

        // Method is not part of the key: any method may be answered from cache.
        if let Some(entry) = self.store.get(&key) {
            if CachePolicy::requires_revalidation(&req.headers) {
                info!(target: "cproxy::proxy", cache_key = %key, "Client sent no-cache, revalidating");
            } else if self.store.is_fresh(&entry, SystemTime::now()) {
                info!(target: "cproxy::proxy", cache_key = %key, "Cache HIT (fresh)");
                return serve_entry(entry, CacheStatus::Hit);
            } else {
                info!(target: "cproxy::proxy", cache_key = %key, "Cache HIT (stale), revalidating");
            }

            return match self.revalidate(&req, &key, entry).await {
                Revalidation::Served(res) => res,
                Revalidation::Replaced(res) => self.store_and_serve(&req.method, key, res),
            };
        }

        info!(target: "cproxy::proxy", cache_key = %key, "Cache MISS");
        self.fetch_and_cache(req, key).await
    }

    /// Conditional request with the entry's validators, no body.
    async fn revalidate(&self, req: &ProxyRequest, key: &CacheKey, entry: CacheEntry) -> Revalidation {
        debug!(
            target: "cproxy::proxy",
            cache_key = %key,
            validators = entry.has_validators(),
            "Sending conditional request"
        );
        let conditional = OriginRequest {
            method: req.method.clone(),
            path_and_query: req.path_and_query().to_string(),
            headers: conditional_headers(&entry),
            body: Bytes::new(),
        };

        let res = match self.origin.send(conditional).await {
            Ok(res) => res,
            Err(e) if e.is_unreachable() => {
                warn!(
                    target: "cproxy::proxy",
                    cache_key = %key,
                    error = %e,
                    "Revalidation failed, serving stale entry"
                );
                let mut stale = serve_entry(entry, CacheStatus::HitStale);
                add_stale_warning(&mut stale.headers);
                return Revalidation::Served(stale);
            }
            Err(e) => {
                error!(target: "cproxy::proxy", cache_key = %key, error = %e, "Revalidation response unreadable");
                return Revalidation::Served(internal_error());
            }
        };

        if res.status != http::StatusCode::NOT_MODIFIED {
            info!(
                target: "cproxy::proxy",
                cache_key = %key,
                status = %res.status,
                "Revalidation returned new content"
            );
            return Revalidation::Replaced(res);
        }

        let now = SystemTime::now();
        let expires_at = self.store.compute_expiry(&res.headers, now);
        if !self.store.refresh_expiry(key, now, expires_at) {
            debug!(target: "cproxy::proxy", cache_key = %key, "Entry vanished during revalidation");
        }
        info!(target: "cproxy::proxy", cache_key = %key, "Revalidated (304), serving cached entry");

        Revalidation::Served(serve_entry(entry, CacheStatus::Hit))
    }

    /// MISS path: forward the full request to the origin.
    async fn fetch_and_cache(&self, req: ProxyRequest, key: CacheKey) -> ProxyResponse {
        let forward = OriginRequest {
            method: req.method.clone(),
            path_and_query: req.path_and_query().to_string(),
            headers: forward_request_headers(&req.headers, &self.hop_by_hop),
            body: req.body,
        };

        match self.origin.send(forward).await {
            Ok(res) => self.store_and_serve(&req.method, key, res),
            Err(e) => origin_failure(&key, &e),
        }
    }

    fn store_and_serve(&self, method: &Method, key: CacheKey, res: OriginResponse) -> ProxyResponse {
        if CachePolicy::is_cacheable(method, res.status, &res.headers) {
            let now = SystemTime::now();
            let expires_at = self.store.compute_expiry(&res.headers, now);
            let entry = CacheEntry::from_response(res.status, &res.headers, res.body.clone(), now, expires_at);
            self.store.put(key, entry);
        } else {
            debug!(
                target: "cproxy::proxy",
                cache_key = %key,
                status = %res.status,
                "Response not cacheable"
            );
        }

        ProxyResponse::new(res.status, res.headers, res.body, CacheStatus::Miss)
    }
}

fn serve_entry(entry: CacheEntry, status: CacheStatus) -> ProxyResponse {
    ProxyResponse::new(entry.status, entry.headers, entry.body, status)
}

fn origin_failure(key: &CacheKey, e: &OriginError) -> ProxyResponse {
    if e.is_unreachable() {
        error!(target: "cproxy::proxy", cache_key = %key, error = %e, "Origin unreachable");
        bad_gateway()
    } else {
        error!(target: "cproxy::proxy", cache_key = %key, error = %e, "Origin exchange failed");
        internal_error()
    }
}

#[cfg(test)]
mod tests {
    use super::ProxyEngine;
    use crate::{
        error::OriginError,
        headers::HopByHop,
        origin::{Origin, OriginRequest, OriginResponse},
    };
    use bytes::Bytes;
    use cproxy_cache::{CacheEntry, CacheKey, CacheStore};
    use cproxy_http::{CacheStatus, ProxyRequest};
    use http::{HeaderMap, HeaderValue, Method, StatusCode};
    use std::{
        collections::VecDeque,
        io,
        sync::Mutex,
        time::{Duration, SystemTime},
    };

    /// Replays canned answers and records what it was asked.
    #[derive(Default)]
    struct ScriptedOrigin {
        answers: Mutex<VecDeque<Result<OriginResponse, OriginError>>>,
        seen: Mutex<Vec<OriginRequest>>,
    }

    impl ScriptedOrigin {
        fn with(answers: Vec<Result<OriginResponse, OriginError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<OriginRequest> {
            self.seen.lock().expect("lock").clone()
        }
    }

    impl Origin for ScriptedOrigin {
        async fn send(&self, req: OriginRequest) -> Result<OriginResponse, OriginError> {
            self.seen.lock().expect("lock").push(req);
            self.answers
                .lock()
                .expect("lock")
                .pop_front()
                .expect("unexpected origin call")
        }
    }

    fn engine(answers: Vec<Result<OriginResponse, OriginError>>) -> ProxyEngine<ScriptedOrigin> {
        ProxyEngine::new(
            CacheStore::new(Duration::from_secs(300)),
            ScriptedOrigin::with(answers),
            HopByHop::default(),
        )
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn answer(status: StatusCode, pairs: &[(&'static str, &'static str)], body: &'static str) -> Result<OriginResponse, OriginError> {
        Ok(OriginResponse {
            status,
            headers: headers(pairs),
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    fn refused() -> Result<OriginResponse, OriginError> {
        Err(OriginError::Connect {
            addr: "127.0.0.1:9".into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        })
    }

    fn get(path: &'static str) -> ProxyRequest {
        ProxyRequest::new(Method::GET, path.parse().expect("uri"))
    }

    /// Entry that expired a second ago.
    fn stale_entry(pairs: &[(&'static str, &'static str)], body: &'static str) -> CacheEntry {
        let now = SystemTime::now();
        CacheEntry::from_response(
            StatusCode::OK,
            &headers(pairs),
            Bytes::from_static(body.as_bytes()),
            now - Duration::from_secs(600),
            now - Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn miss_then_fresh_hit_without_origin_call() {
        let engine = engine(vec![answer(
            StatusCode::OK,
            &[("cache-control", "max-age=60")],
            "hello",
        )]);

        let first = engine.handle(get("/page?x=1")).await;
        assert_eq!(first.cache_status, Some(CacheStatus::Miss));
        assert_eq!(first.body, Bytes::from("hello"));

        let entry = engine.store().get(&CacheKey::new("/page?x=1")).expect("stored");
        let ttl = entry.expires_at.duration_since(entry.stored_at).expect("future expiry");
        assert_eq!(ttl, Duration::from_secs(60));

        let second = engine.handle(get("/page?x=1")).await;
        assert_eq!(second.cache_status, Some(CacheStatus::Hit));
        assert_eq!(second.status, StatusCode::OK);
        assert_eq!(second.body, Bytes::from("hello"));
        assert_eq!(engine.origin().seen().len(), 1);
    }

    #[tokio::test]
    async fn not_modified_refreshes_and_serves_cached_body() {
        let engine = engine(vec![answer(
            StatusCode::NOT_MODIFIED,
            &[("cache-control", "max-age=120")],
            "",
        )]);
        let key = CacheKey::new("/doc");
        engine.store().put(
            key.clone(),
            stale_entry(
                &[("etag", "\"v1\""), ("last-modified", "Sun, 01 Jan 2023 00:00:00 GMT")],
                "cached body",
            ),
        );

        let res = engine.handle(get("/doc")).await;
        assert_eq!(res.cache_status, Some(CacheStatus::Hit));
        assert_eq!(res.body, Bytes::from("cached body"));
        assert_eq!(res.headers.get("etag").map(|v| v.as_bytes()), Some(&b"\"v1\""[..]));

        let seen = engine.origin().seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].path_and_query, "/doc");
        assert!(seen[0].body.is_empty());
        assert_eq!(
            seen[0].headers.get("if-none-match").map(|v| v.as_bytes()),
            Some(&b"\"v1\""[..])
        );
        assert_eq!(
            seen[0].headers.get("if-modified-since").map(|v| v.as_bytes()),
            Some(&b"Sun, 01 Jan 2023 00:00:00 GMT"[..])
        );

        let refreshed = engine.store().get(&key).expect("still cached");
        assert!(refreshed.is_fresh(SystemTime::now()));
        assert_eq!(refreshed.body, Bytes::from("cached body"));
    }

    #[tokio::test]
    async fn origin_down_serves_stale_with_warning() {
        let engine = engine(vec![refused()]);
        let key = CacheKey::new("/doc");
        let entry = stale_entry(&[("etag", "\"v1\"")], "old");
        let expires_at = entry.expires_at;
        engine.store().put(key.clone(), entry);

        let res = engine.handle(get("/doc")).await;
        assert_eq!(res.cache_status, Some(CacheStatus::HitStale));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, Bytes::from("old"));
        assert_eq!(
            res.headers.get("warning").and_then(|v| v.to_str().ok()),
            Some("111 - \"Revalidation Failed\"")
        );

        let unchanged = engine.store().get(&key).expect("still cached");
        assert_eq!(unchanged.expires_at, expires_at);
    }

    #[tokio::test]
    async fn revalidation_with_new_content_replaces_entry() {
        let engine = engine(vec![answer(
            StatusCode::OK,
            &[("cache-control", "max-age=30"), ("etag", "\"v2\"")],
            "new",
        )]);
        let key = CacheKey::new("/doc");
        engine.store().put(key.clone(), stale_entry(&[("etag", "\"v1\"")], "old"));

        let res = engine.handle(get("/doc")).await;
        assert_eq!(res.cache_status, Some(CacheStatus::Miss));
        assert_eq!(res.body, Bytes::from("new"));
        assert_eq!(engine.origin().seen().len(), 1);

        let entry = engine.store().get(&key).expect("replaced");
        assert_eq!(entry.body, Bytes::from("new"));
        assert_eq!(entry.etag.as_deref(), Some("\"v2\""));
    }

    #[tokio::test]
    async fn no_cache_request_forces_revalidation_of_fresh_entry() {
        let engine = engine(vec![answer(StatusCode::NOT_MODIFIED, &[], "")]);
        let key = CacheKey::new("/fresh");
        let now = SystemTime::now();
        engine.store().put(
            key,
            CacheEntry::from_response(
                StatusCode::OK,
                &headers(&[("etag", "\"a\"")]),
                Bytes::from_static(b"body"),
                now,
                now + Duration::from_secs(3600),
            ),
        );

        let mut req = get("/fresh");
        req.headers
            .insert("cache-control", HeaderValue::from_static("no-cache"));
        let res = engine.handle(req).await;

        assert_eq!(res.cache_status, Some(CacheStatus::Hit));
        assert_eq!(res.body, Bytes::from("body"));
        assert_eq!(engine.origin().seen().len(), 1);
    }

    #[tokio::test]
    async fn no_store_response_is_not_cached() {
        let engine = engine(vec![
            answer(StatusCode::OK, &[("cache-control", "no-store")], "secret"),
            answer(StatusCode::OK, &[("cache-control", "no-store")], "secret"),
        ]);

        let first = engine.handle(get("/private")).await;
        assert_eq!(first.cache_status, Some(CacheStatus::Miss));
        assert!(engine.store().is_empty());

        let second = engine.handle(get("/private")).await;
        assert_eq!(second.cache_status, Some(CacheStatus::Miss));
        assert_eq!(engine.origin().seen().len(), 2);
    }

    #[tokio::test]
    async fn non_200_responses_are_relayed_but_not_cached() {
        let engine = engine(vec![answer(StatusCode::NOT_FOUND, &[], "nope")]);

        let res = engine.handle(get("/missing")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.cache_status, Some(CacheStatus::Miss));
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn post_to_fresh_key_is_served_from_cache() {
        let engine = engine(vec![]);
        let now = SystemTime::now();
        engine.store().put(
            CacheKey::new("/items"),
            CacheEntry::from_response(
                StatusCode::OK,
                &HeaderMap::new(),
                Bytes::from_static(b"cached"),
                now,
                now + Duration::from_secs(3600),
            ),
        );

        let mut req = ProxyRequest::new(Method::POST, "/items".parse().expect("uri"));
        req.body = Bytes::from_static(b"{\"a\":1}");
        let res = engine.handle(req).await;

        assert_eq!(res.cache_status, Some(CacheStatus::Hit));
        assert_eq!(res.body, Bytes::from("cached"));
        assert!(engine.origin().seen().is_empty());
    }

    #[tokio::test]
    async fn post_to_stale_key_revalidates_without_body() {
        let engine = engine(vec![answer(StatusCode::NOT_MODIFIED, &[], "")]);
        engine
            .store()
            .put(CacheKey::new("/items"), stale_entry(&[("etag", "\"v1\"")], "cached"));

        let mut req = ProxyRequest::new(Method::POST, "/items".parse().expect("uri"));
        req.body = Bytes::from_static(b"{\"a\":1}");
        let res = engine.handle(req).await;

        assert_eq!(res.cache_status, Some(CacheStatus::Hit));
        assert_eq!(res.body, Bytes::from("cached"));
        let seen = engine.origin().seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::POST);
        assert!(seen[0].body.is_empty());
        assert_eq!(
            seen[0].headers.get("if-none-match").map(|v| v.as_bytes()),
            Some(&b"\"v1\""[..])
        );
    }

    #[tokio::test]
    async fn post_on_miss_forwards_body_and_is_not_stored() {
        let engine = engine(vec![answer(StatusCode::OK, &[], "created")]);

        let mut req = ProxyRequest::new(Method::POST, "/items".parse().expect("uri"));
        req.body = Bytes::from_static(b"{\"a\":1}");
        let res = engine.handle(req).await;

        assert_eq!(res.cache_status, Some(CacheStatus::Miss));
        assert_eq!(res.body, Bytes::from("created"));
        let seen = engine.origin().seen();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].body, Bytes::from_static(b"{\"a\":1}"));
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn stale_entry_without_validators_sends_unconditional_request() {
        let engine = engine(vec![answer(
            StatusCode::OK,
            &[("cache-control", "max-age=60")],
            "fresh copy",
        )]);
        let key = CacheKey::new("/plain");
        engine.store().put(key.clone(), stale_entry(&[], "old"));

        let res = engine.handle(get("/plain")).await;
        assert_eq!(res.cache_status, Some(CacheStatus::Miss));
        assert_eq!(res.body, Bytes::from("fresh copy"));

        let seen = engine.origin().seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].headers.get("if-none-match").is_none());
        assert!(seen[0].headers.get("if-modified-since").is_none());
        assert_eq!(engine.store().get(&key).map(|e| e.body), Some(Bytes::from("fresh copy")));
    }

    #[tokio::test]
    async fn head_revalidation_with_new_content_is_relayed_not_stored() {
        let engine = engine(vec![answer(StatusCode::OK, &[("etag", "\"v2\"")], "")]);
        let key = CacheKey::new("/doc");
        engine.store().put(key.clone(), stale_entry(&[("etag", "\"v1\"")], "old"));

        let res = engine
            .handle(ProxyRequest::new(Method::HEAD, "/doc".parse().expect("uri")))
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.cache_status, Some(CacheStatus::Miss));
        assert_eq!(res.headers.get("etag").map(|v| v.as_bytes()), Some(&b"\"v2\""[..]));

        let seen = engine.origin().seen();
        assert_eq!(seen[0].method, Method::HEAD);
        let kept = engine.store().get(&key).expect("entry kept");
        assert_eq!(kept.body, Bytes::from("old"));
        assert_eq!(kept.etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn huge_default_ttl_does_not_panic() {
        let engine = ProxyEngine::new(
            CacheStore::new(Duration::from_secs(u64::MAX)),
            ScriptedOrigin::with(vec![answer(StatusCode::OK, &[], "x")]),
            HopByHop::default(),
        );

        let res = engine.handle(get("/x")).await;
        assert_eq!(res.cache_status, Some(CacheStatus::Miss));
        let entry = engine.store().get(&CacheKey::new("/x")).expect("stored");
        assert!(entry.is_fresh(SystemTime::now()));
    }

    #[tokio::test]
    async fn miss_forwards_headers_without_hop_by_hop() {
        let engine = engine(vec![answer(StatusCode::OK, &[], "ok")]);
        let mut req = get("/h");
        req.headers = headers(&[
            ("host", "proxy.local"),
            ("connection", "close"),
            ("accept", "text/plain"),
        ]);

        engine.handle(req).await;

        let seen = engine.origin().seen();
        assert!(seen[0].headers.get("host").is_none());
        assert!(seen[0].headers.get("connection").is_none());
        assert!(seen[0].headers.get("accept").is_some());
    }

    #[tokio::test]
    async fn unreachable_origin_on_miss_is_bad_gateway() {
        let engine = engine(vec![refused()]);

        let res = engine.handle(get("/x")).await;
        assert_eq!(res.status, StatusCode::BAD_GATEWAY);
        assert!(res.cache_status.is_none());
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn body_failure_is_internal_error() {
        let engine = engine(vec![Err(OriginError::BodyTimeout(Duration::from_secs(10)))]);

        let res = engine.handle(get("/x")).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn clear_cache_empties_store_and_is_idempotent() {
        let engine = engine(vec![]);
        engine.store().put(CacheKey::new("/a"), stale_entry(&[], "a"));
        engine.store().put(CacheKey::new("/b"), stale_entry(&[], "b"));

        engine.clear_cache();
        assert!(engine.store().get(&CacheKey::new("/a")).is_none());
        engine.clear_cache();
        assert!(engine.store().is_empty());
    }
}
