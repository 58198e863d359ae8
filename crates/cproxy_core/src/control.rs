//! Client side of the admin endpoints, used by `cproxy --clear-cache`.

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use http::{Method, Request, StatusCode, header::HOST};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs to `path` on a running instance and returns its status and body.
pub async fn send_admin_command(host: &str, port: u16, path: &str) -> anyhow::Result<(StatusCode, String)> {
    tokio::time::timeout(CONTROL_TIMEOUT, post(host, port, path))
        .await
        .with_context(|| format!("no answer from {host}:{port} within {CONTROL_TIMEOUT:?}"))?
}

async fn post(host: &str, port: u16, path: &str) -> anyhow::Result<(StatusCode, String)> {
    let stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("cannot connect to proxy at {host}:{port}"))?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(target: "cproxy::control", error = ?e, "Control connection closed with error");
        }
    });

    let req = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(HOST, format!("{host}:{port}"))
        .body(Empty::<Bytes>::new())?;

    let res = sender.send_request(req).await.context("admin request failed")?;
    let status = res.status();
    let body = res.into_body().collect().await?.to_bytes();

    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}
