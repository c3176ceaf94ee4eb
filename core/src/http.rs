//! HTTP transport types and the `Transport` seam.
//!
//! # Design
//! Requests and responses are plain data. `RequestClient` builds a fully
//! resolved `HttpRequest` (absolute url, layered headers, encoded body,
//! timeout, proxy) and hands it to an injected `Transport`, which owns the
//! actual I/O. Keeping the client on this side of the seam makes every
//! decision it takes testable against a scripted transport.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::multipart::UploadHooks;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute url, base url already applied.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    /// Proxy url. The transport picks the plain or TLS proxy agent from the
    /// scheme of `url`.
    pub proxy: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Failure of the transport itself: no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The network collaborator behind a `RequestClient`.
///
/// Implementations must enforce `HttpRequest::timeout` and route through
/// `HttpRequest::proxy` when one is set. Any status code is a successful
/// transport outcome; classification happens in the client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send an upload, reporting progress to `hooks`.
    ///
    /// The default reports a single progress event once the transport is
    /// done; transports that can observe the body being written should
    /// override it.
    async fn upload(
        &self,
        request: HttpRequest,
        hooks: &UploadHooks,
    ) -> Result<HttpResponse, TransportError> {
        let total = request.body.as_ref().map_or(0, |b| b.len() as u64);
        match self.execute(request).await {
            Ok(response) => {
                hooks.progress(total, total);
                hooks.load(response.status);
                Ok(response)
            }
            Err(err) => {
                hooks.error(&err.message);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }

    async fn upload(
        &self,
        request: HttpRequest,
        hooks: &UploadHooks,
    ) -> Result<HttpResponse, TransportError> {
        (**self).upload(request, hooks).await
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Insert or replace a header, matching names case-insensitively.
pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(entry) => {
            entry.0 = name.to_string();
            entry.1 = value.to_string();
        }
        None => headers.push((name.to_string(), value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut headers = vec![("Content-Type".to_string(), "text/plain".to_string())];
        set_header(&mut headers, "content-type", "application/json");
        assert_eq!(
            headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn set_header_appends_new_names() {
        let mut headers = vec![("X-One".to_string(), "1".to_string())];
        set_header(&mut headers, "X-Two", "2");
        assert_eq!(headers.len(), 2);
        assert_eq!(find_header(&headers, "x-two"), Some("2"));
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Bytes::new(),
        };
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert!(response.header("etag").is_none());
    }

    #[test]
    fn method_display_is_uppercase() {
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
