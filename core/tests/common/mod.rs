//! Shared fixtures: a live mock server and a ureq-backed transport.

#![allow(dead_code)]

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use courier_core::{ClientConfig, HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

/// Start the mock server on a random port in a background thread.
pub fn spawn_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

/// Configuration pointing at `addr` over plain HTTP.
pub fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        endpoint: addr.to_string(),
        ..ClientConfig::default()
    }
}

/// An address nothing listens on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Executes requests with ureq on the blocking pool.
///
/// Status-code-as-error is disabled so 4xx/5xx responses come back as data
/// and the client does the classification.
pub struct UreqTransport;

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tokio::task::spawn_blocking(move || execute_blocking(request))
            .await
            .map_err(|e| TransportError::new(e.to_string()))?
    }
}

fn execute_blocking(req: HttpRequest) -> Result<HttpResponse, TransportError> {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(req.timeout))
        .build()
        .new_agent();

    let result = match req.method {
        HttpMethod::Get => with_headers_empty(agent.get(&req.url), &req.headers).call(),
        HttpMethod::Delete => with_headers_empty(agent.delete(&req.url), &req.headers).call(),
        HttpMethod::Post => send(with_headers_body(agent.post(&req.url), &req.headers), req.body),
        HttpMethod::Put => send(with_headers_body(agent.put(&req.url), &req.headers), req.body),
    };
    let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| TransportError::new(e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body: Bytes::from(body),
    })
}

fn with_headers_empty(
    mut builder: ureq::RequestBuilder<ureq::typestate::WithoutBody>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
    for (k, v) in headers {
        builder = builder.header(k, v);
    }
    builder
}

fn with_headers_body(
    mut builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
    for (k, v) in headers {
        builder = builder.header(k, v);
    }
    builder
}

fn send(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<Bytes>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(&body[..]),
        None => builder.send_empty(),
    }
}
