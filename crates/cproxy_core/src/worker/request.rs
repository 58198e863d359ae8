use bytes::Bytes;
use cproxy_http::{ProxyRequest, ProxyResponse, responses::bad_request};
use cproxy_proxy::{HopByHop, headers::relay_response_headers};
use http::{HeaderName, HeaderValue, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use tracing::warn;

/// Buffers the client request into a [`ProxyRequest`].
///
/// A body that cannot be read is answered with 400 right away.
pub(crate) async fn read_proxy_request<B>(req: Request<B>) -> Result<ProxyRequest, ProxyResponse>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(
                target: "cproxy::worker",
                path = %parts.uri.path(),
                error = %e,
                "Failed to read client request body"
            );
            return Err(bad_request());
        }
    };

    Ok(ProxyRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    })
}

/// Maps a [`ProxyResponse`] back onto the wire.
///
/// Hop-by-hop and framing headers are dropped (hyper re-derives them) and the
/// cache status header is added when the response went through the cache.
pub(crate) fn into_hyper_response(
    res: ProxyResponse,
    hop_by_hop: &HopByHop,
    status_header: Option<&HeaderName>,
) -> Response<Full<Bytes>> {
    let mut headers = relay_response_headers(&res.headers, hop_by_hop);

    if let (Some(name), Some(status)) = (status_header, res.cache_status) {
        headers.insert(name.clone(), HeaderValue::from_static(status.as_str()));
    }

    let mut response = Response::new(Full::new(res.body));
    *response.status_mut() = res.status;
    *response.headers_mut() = headers;
    response
}
