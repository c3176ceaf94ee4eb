//! `Transport` backed by `reqwest`.

use std::error::Error as StdError;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
use crate::multipart::UploadHooks;

/// Upload bodies are streamed in chunks of this size so progress can be
/// reported while the body is written.
const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Proxy routing a `reqwest::Client` was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClientKey {
    proxy: Option<String>,
    tls: bool,
}

impl ClientKey {
    fn for_request(request: &HttpRequest) -> Self {
        Self {
            proxy: request.proxy.clone(),
            tls: request.url.starts_with("https://"),
        }
    }
}

/// Executes requests with a cached `reqwest::Client`.
///
/// The client is rebuilt only when a request needs different proxy routing
/// than the cached one was built with.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    cached: Mutex<Option<(ClientKey, reqwest::Client)>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, request: &HttpRequest) -> Result<reqwest::Client, TransportError> {
        let key = ClientKey::for_request(request);
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_key, client)) = cached.as_ref() {
            if *cached_key == key {
                return Ok(client.clone());
            }
        }
        let client = build_client(&key)?;
        tracing::debug!(proxy = ?key.proxy, tls = key.tls, "built reqwest client");
        *cached = Some((key, client.clone()));
        Ok(client)
    }

    fn builder(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let client = self.client_for(request)?;
        let mut builder = client
            .request(to_reqwest_method(request.method), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.builder(&request)?;
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(|e| describe(&e))?;
        into_http_response(response).await
    }

    async fn upload(
        &self,
        request: HttpRequest,
        hooks: &UploadHooks,
    ) -> Result<HttpResponse, TransportError> {
        let result = self.send_upload(request, hooks).await;
        match &result {
            Ok(response) => hooks.load(response.status),
            Err(err) => hooks.error(&err.message),
        }
        result
    }
}

impl ReqwestTransport {
    async fn send_upload(
        &self,
        request: HttpRequest,
        hooks: &UploadHooks,
    ) -> Result<HttpResponse, TransportError> {
        let builder = self.builder(&request)?;
        let body = request.body.unwrap_or_default();
        let total = body.len() as u64;

        let chunks: Vec<Bytes> = (0..body.len())
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| body.slice(start..(start + UPLOAD_CHUNK_SIZE).min(body.len())))
            .collect();
        let observer = hooks.clone();
        let mut sent = 0u64;
        let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            observer.progress(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let response = builder
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| describe(&e))?;
        into_http_response(response).await
    }
}

fn build_client(key: &ClientKey) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder();
    builder = match &key.proxy {
        Some(proxy) => {
            let proxy = if key.tls {
                reqwest::Proxy::https(proxy)
            } else {
                reqwest::Proxy::http(proxy)
            }
            .map_err(|e| describe(&e))?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };
    builder.build().map_err(|e| describe(&e))
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

async fn into_http_response(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.bytes().await.map_err(|e| describe(&e))?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Flatten a reqwest error and its sources into one message.
fn describe(err: &reqwest::Error) -> TransportError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError::new(message)
}
