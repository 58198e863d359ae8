//! Origin client: one HTTP/1.1 connection per exchange, plain TCP or TLS.

use std::{future::Future, io, sync::Arc, time::Duration};

use bytes::Bytes;
use cproxy_config::{ConfigError, OriginConfig, OriginScheme, OriginTarget};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header::HOST};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time::{Instant, timeout_at},
};
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore, pki_types::ServerName},
};
use tracing::{debug, instrument};

use crate::error::OriginError;

/// Request sent to the origin. `path_and_query` is appended to the origin base URL.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fully buffered origin response.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Anything able to answer origin requests.
pub trait Origin: Send + Sync {
    fn send(
        &self,
        req: OriginRequest,
    ) -> impl Future<Output = Result<OriginResponse, OriginError>> + Send;
}

/// Real origin over the network.
#[derive(Clone)]
pub struct HttpOrigin {
    target: OriginTarget,
    timeout: Duration,
    tls: Option<TlsConnector>,
}

impl HttpOrigin {
    pub fn new(target: OriginTarget, timeout: Duration) -> Self {
        let tls = match target.scheme {
            OriginScheme::Https => Some(tls_connector()),
            OriginScheme::Http => None,
        };

        Self {
            target,
            timeout,
            tls,
        }
    }

    pub fn from_config(cfg: &OriginConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(cfg.target()?, cfg.timeout()))
    }

    pub fn target(&self) -> &OriginTarget {
        &self.target
    }

    fn build_request(&self, req: OriginRequest) -> Result<Request<Full<Bytes>>, OriginError> {
        let mut request = Request::builder()
            .method(req.method)
            .uri(req.path_and_query.as_str())
            .body(Full::new(req.body))?;

        *request.headers_mut() = req.headers;
        let host = HeaderValue::from_str(&self.target.authority).map_err(http::Error::from)?;
        request.headers_mut().insert(HOST, host);

        Ok(request)
    }

    /// Connect (+ TLS) and send; resolves once the response head arrived.
    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<Response<Incoming>, OriginError> {
        let host = self.target.host.as_str();
        let port = self.target.port;

        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|source| OriginError::Connect {
                addr: format!("{host}:{port}"),
                source,
            })?;

        let Some(connector) = &self.tls else {
            return send_over(tcp, request).await;
        };

        let server_name = ServerName::try_from(host.to_string()).map_err(|e| OriginError::Tls {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|source| OriginError::Tls {
                host: host.to_string(),
                source,
            })?;

        send_over(stream, request).await
    }
}

impl Origin for HttpOrigin {
    #[instrument(skip(self, req), fields(origin = %self.target, method = %req.method, path = %req.path_and_query))]
    async fn send(&self, req: OriginRequest) -> Result<OriginResponse, OriginError> {
        // One deadline for the head and the body.
        let deadline = deadline_after(self.timeout);
        let request = self.build_request(req)?;

        let response = match timeout_at(deadline, self.exchange(request)).await {
            Ok(res) => res?,
            Err(_) => return Err(OriginError::Timeout(self.timeout)),
        };

        let (parts, body) = response.into_parts();
        let body = match timeout_at(deadline, body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => return Err(OriginError::Body(e)),
            Err(_) => return Err(OriginError::BodyTimeout(self.timeout)),
        };

        debug!(
            target: "cproxy::origin",
            status = %parts.status,
            body_len = body.len(),
            "Origin response received"
        );

        Ok(OriginResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// Far-off stand-in when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

async fn send_over<S>(stream: S, request: Request<Full<Bytes>>) -> Result<Response<Incoming>, OriginError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(target: "cproxy::origin", error = ?e, "Origin connection closed with error");
        }
    });

    Ok(sender.send_request(request).await?)
}

fn tls_connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
