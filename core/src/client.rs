//! The request client: option layering, dispatch, classification.
//!
//! # Design
//! Every verb goes through the same three steps. `build` resolves the call
//! into a plain `HttpRequest` (config defaults, then method defaults, then
//! caller options). The injected `Transport` executes it. `parse` classifies
//! the status and normalizes the body. `build` and `parse` are public so the
//! decision logic can be exercised without any I/O.
//!
//! Configuration is read once per call, when the request is built.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::{ClientConfig, ConfigPatch, ConfigStore};
use crate::diagnostics::ErrorSink;
use crate::error::Error;
use crate::http::{set_header, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::multipart::{MultipartForm, UploadHooks};
use crate::normalize::{self, Body, JsonMode, ResponseFilter};
use crate::options::{Payload, RequestOptions};
use crate::status::{classify, Classification};

/// A successful response as handed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl ClientResponse {
    /// Deserialize the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        self.body.json()
    }
}

/// A request resolved from the client configuration and call options, plus
/// what `parse` needs to interpret its response.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub request: HttpRequest,
    pub json: JsonMode,
    pub response_filter: Option<ResponseFilter>,
    pub log_bodies: bool,
}

/// HTTP client over an injected `Transport`.
pub struct RequestClient<T> {
    transport: T,
    config: ConfigStore,
    error_sink: Option<Arc<dyn ErrorSink>>,
}

impl<T: Transport> RequestClient<T> {
    /// Client with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config: ConfigStore::new(config),
            error_sink: None,
        }
    }

    /// Report every returned error to `sink`.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Deep-merge `patch` into the configuration.
    pub fn set_config(&self, patch: ConfigPatch) {
        self.config.apply(patch);
    }

    /// Snapshot of the current configuration.
    pub fn get_config(&self) -> ClientConfig {
        self.config.snapshot()
    }

    /// Live handle on the configuration; reads through it observe later
    /// `set_config` calls.
    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    pub async fn get(&self, path: &str) -> Result<ClientResponse, Error> {
        self.send(HttpMethod::Get, path, RequestOptions::default()).await
    }

    pub async fn get_with(&self, path: &str, options: RequestOptions) -> Result<ClientResponse, Error> {
        self.send(HttpMethod::Get, path, options).await
    }

    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<ClientResponse, Error> {
        self.send(HttpMethod::Post, path, options).await
    }

    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<ClientResponse, Error> {
        self.send(HttpMethod::Put, path, options).await
    }

    pub async fn delete(&self, path: &str) -> Result<ClientResponse, Error> {
        self.send(HttpMethod::Delete, path, RequestOptions::default()).await
    }

    pub async fn delete_with(&self, path: &str, options: RequestOptions) -> Result<ClientResponse, Error> {
        self.send(HttpMethod::Delete, path, options).await
    }

    /// Issue one request for `method` and classify its outcome.
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<ClientResponse, Error> {
        let result = self.dispatch(method, path, options).await;
        if let Err(err) = &result {
            self.report(method, path, err);
        }
        result
    }

    /// Upload `form` as `multipart/form-data`.
    ///
    /// Completion of the upload transport is success: the per-verb status
    /// table does not apply here, so a 4xx/5xx answer comes back as a
    /// `ClientResponse` carrying that status.
    pub async fn multipart_post(
        &self,
        url: &str,
        form: &MultipartForm,
        hooks: UploadHooks,
        options: RequestOptions,
    ) -> Result<ClientResponse, Error> {
        let result = self.dispatch_multipart(url, form, &hooks, options).await;
        if let Err(err) = &result {
            self.report(HttpMethod::Post, url, err);
        }
        result
    }

    /// Resolve `path` and `options` into a request without sending it.
    pub fn build(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<PreparedRequest, Error> {
        let config = self.config.snapshot();
        let url = resolve_url(&config.base_url(), path)?;
        let resolved = method_defaults(method, &config).merge(options);

        let mut headers = Vec::with_capacity(config.headers.len() + 1);
        for (name, value) in &config.headers {
            set_header(&mut headers, name, value);
        }

        let body = match &resolved.payload {
            Some(payload) => {
                let content_type = resolved.content_type.unwrap_or(config.content_type);
                if matches!(payload, Payload::Json(_)) {
                    set_header(&mut headers, "content-type", content_type.mime());
                }
                Some(payload.encode(content_type)?)
            }
            None => None,
        };

        if let Some(caller_headers) = &resolved.headers {
            for (name, value) in caller_headers {
                set_header(&mut headers, name, value);
            }
        }

        Ok(PreparedRequest {
            request: HttpRequest {
                method,
                url,
                headers,
                body,
                timeout: resolved.timeout.unwrap_or(config.timeout),
                proxy: config.proxy.clone(),
            },
            json: resolved.json.unwrap_or(config.json),
            response_filter: resolved.response_filter,
            log_bodies: config.log_bodies,
        })
    }

    /// Classify `response` and normalize its body.
    pub fn parse(
        &self,
        prepared: &PreparedRequest,
        response: HttpResponse,
    ) -> Result<ClientResponse, Error> {
        let content_type = response.header("content-type").map(str::to_owned);
        match classify(prepared.request.method, response.status) {
            Classification::Success => {
                let body = normalize::normalize(
                    &response.body,
                    content_type.as_deref(),
                    prepared.json,
                    prepared.response_filter.as_ref(),
                )?;
                if prepared.log_bodies {
                    tracing::debug!(status = response.status, body = %body.to_text(), "response body");
                }
                Ok(ClientResponse {
                    status: response.status,
                    headers: response.headers,
                    body,
                })
            }
            Classification::Failure { status } => Err(Error::Status {
                status,
                body: normalize::lenient(&response.body, content_type.as_deref(), prepared.json),
            }),
        }
    }

    async fn dispatch(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<ClientResponse, Error> {
        let prepared = self.build(method, path, options)?;
        tracing::debug!(%method, url = %prepared.request.url, "sending request");

        let response = self
            .transport
            .execute(prepared.request.clone())
            .await
            .map_err(|e| Error::ClientRequest { message: e.message })?;
        tracing::debug!(%method, status = response.status, "received response");

        self.parse(&prepared, response)
    }

    async fn dispatch_multipart(
        &self,
        url: &str,
        form: &MultipartForm,
        hooks: &UploadHooks,
        options: RequestOptions,
    ) -> Result<ClientResponse, Error> {
        let (boundary, body) = form.encode();
        let mut prepared = self.build(HttpMethod::Post, url, options.payload(Payload::Raw(body)))?;
        set_header(
            &mut prepared.request.headers,
            "content-type",
            &format!("multipart/form-data; boundary={boundary}"),
        );
        tracing::debug!(url = %prepared.request.url, parts = form.parts().len(), "sending multipart upload");

        let response = self
            .transport
            .upload(prepared.request, hooks)
            .await
            .map_err(|e| Error::ClientRequest { message: e.message })?;
        tracing::debug!(
            status = response.status,
            "multipart upload completed; status table not applied"
        );

        let content_type = response.header("content-type").map(str::to_owned);
        let body = normalize::lenient(&response.body, content_type.as_deref(), prepared.json);
        Ok(ClientResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }

    fn report(&self, method: HttpMethod, path: &str, err: &Error) {
        tracing::warn!(%method, path, error = %err, "request failed");
        if let Some(sink) = &self.error_sink {
            sink.record(err);
        }
    }
}

#[cfg(feature = "reqwest")]
impl RequestClient<crate::transport::ReqwestTransport> {
    /// Client backed by `reqwest`.
    pub fn with_reqwest(config: ClientConfig) -> Self {
        Self::with_config(crate::transport::ReqwestTransport::new(), config)
    }
}

/// Layer applied between the configuration and the caller's options.
fn method_defaults(method: HttpMethod, config: &ClientConfig) -> RequestOptions {
    let mut defaults = RequestOptions::new()
        .json_mode(config.json)
        .timeout(config.timeout);
    if let Some(filter) = &config.response_filter {
        defaults = defaults.response_filter(filter.clone());
    }
    match method {
        HttpMethod::Post | HttpMethod::Put => defaults.content_type(config.content_type),
        HttpMethod::Get | HttpMethod::Delete => defaults,
    }
}

/// Join `path` onto `base_url`. Absolute `http(s)` urls are used as given.
///
/// Only the path is checked here; a broken base url surfaces from the
/// transport.
fn resolve_url(base_url: &str, path: &str) -> Result<String, Error> {
    if path.is_empty() {
        return Err(Error::InvalidArgument("path must not be empty".to_string()));
    }
    if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidArgument(format!(
            "path `{}` contains whitespace or control characters",
            path.escape_debug()
        )));
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        url::Url::parse(path)
            .map_err(|e| Error::InvalidArgument(format!("`{path}` is not a valid url: {e}")))?;
        return Ok(path.to_string());
    }
    if path.starts_with('/') {
        Ok(format!("{base_url}{path}"))
    } else {
        Ok(format!("{base_url}/{path}"))
    }
}
