use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};

use crate::exchange::ProxyResponse;

/// Helper genérico para una respuesta de texto plano generada localmente.
pub fn text_response(status: StatusCode, body: &str) -> ProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    ProxyResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
        cache_status: None,
    }
}

pub fn bad_request() -> ProxyResponse {
    text_response(StatusCode::BAD_REQUEST, "400 Bad Request\n")
}

pub fn not_found() -> ProxyResponse {
    text_response(StatusCode::NOT_FOUND, "404 Not Found\n")
}

pub fn method_not_allowed() -> ProxyResponse {
    let mut res = text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed\n");
    res.headers
        .insert(header::ALLOW, HeaderValue::from_static("POST"));
    res
}

pub fn internal_error() -> ProxyResponse {
    text_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "500 Internal Server Error\n",
    )
}

pub fn bad_gateway() -> ProxyResponse {
    text_response(
        StatusCode::BAD_GATEWAY,
        "502 Bad Gateway (Origin Unreachable/Timeout)\n",
    )
}
