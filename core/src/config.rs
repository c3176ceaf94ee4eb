//! Client configuration and the store that merges updates into it.
//!
//! # Design
//! `ClientConfig` is the fully resolved configuration; `ConfigPatch` is a
//! partial update where every field is optional. `ConfigStore::apply` merges
//! a patch deeply: scalar fields replace, the header map merges key by key,
//! so adding one header never drops the others. The store is a shared
//! handle, so a clone of it observes later updates.
//!
//! Field values are not validated here. A bad endpoint or proxy surfaces as
//! a transport error on the first request.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;
use crate::normalize::{JsonMode, ResponseFilter};

/// Environment variable holding a JSON `ConfigPatch`.
pub const CONFIG_ENV_VAR: &str = "COURIER_CONFIG";

/// Encoding used for structured POST/PUT payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// Resolved configuration of one `RequestClient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host (and optional port) requests are sent to.
    pub endpoint: String,
    pub ssl: bool,
    pub headers: BTreeMap<String, String>,
    pub proxy: Option<String>,
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    pub json: JsonMode,
    pub content_type: ContentType,
    /// Filter applied to every successful body unless a call supplies its own.
    #[serde(skip)]
    pub response_filter: Option<ResponseFilter>,
    /// Log normalized response bodies at debug level.
    pub log_bodies: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost".to_string(),
            ssl: false,
            headers: BTreeMap::new(),
            proxy: None,
            timeout: Duration::from_millis(5000),
            json: JsonMode::Force,
            content_type: ContentType::Json,
            response_filter: None,
            log_bodies: false,
        }
    }
}

impl ClientConfig {
    /// `http://{endpoint}` or `https://{endpoint}` depending on `ssl`.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint.trim_end_matches('/'))
    }

    /// Merge `patch` into this configuration.
    pub fn apply(&mut self, patch: ConfigPatch) {
        let ConfigPatch {
            endpoint,
            ssl,
            headers,
            proxy,
            timeout,
            json,
            content_type,
            response_filter,
            log_bodies,
        } = patch;

        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if let Some(ssl) = ssl {
            self.ssl = ssl;
        }
        if let Some(headers) = headers {
            self.headers.extend(headers);
        }
        if let Some(proxy) = proxy {
            self.proxy = proxy;
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        if let Some(json) = json {
            self.json = json;
        }
        if let Some(content_type) = content_type {
            self.content_type = content_type;
        }
        if let Some(filter) = response_filter {
            self.response_filter = filter;
        }
        if let Some(log_bodies) = log_bodies {
            self.log_bodies = log_bodies;
        }
    }
}

/// Partial configuration update. Absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigPatch {
    pub endpoint: Option<String>,
    pub ssl: Option<bool>,
    pub headers: Option<BTreeMap<String, String>>,
    /// `Some(None)` clears the proxy; in JSON that is `"proxy": null`.
    #[serde(deserialize_with = "double_option")]
    pub proxy: Option<Option<String>>,
    #[serde(rename = "timeout_ms", with = "millis_opt")]
    pub timeout: Option<Duration>,
    pub json: Option<JsonMode>,
    pub content_type: Option<ContentType>,
    #[serde(skip)]
    pub response_filter: Option<Option<ResponseFilter>>,
    pub log_bodies: Option<bool>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a patch from JSON.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidArgument(format!("invalid config: {e}")))
    }

    /// Read a patch from `COURIER_CONFIG`. `Ok(None)` when the variable is unset.
    pub fn from_env() -> Result<Option<Self>, Error> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(raw) => Self::from_json(&raw).map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    /// Add one header to the patch. Repeated calls accumulate.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(Some(proxy.into()));
        self
    }

    pub fn no_proxy(mut self) -> Self {
        self.proxy = Some(None);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn json(mut self, mode: JsonMode) -> Self {
        self.json = Some(mode);
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn response_filter(mut self, filter: ResponseFilter) -> Self {
        self.response_filter = Some(Some(filter));
        self
    }

    pub fn no_response_filter(mut self) -> Self {
        self.response_filter = Some(None);
        self
    }

    pub fn log_bodies(mut self, enabled: bool) -> Self {
        self.log_bodies = Some(enabled);
        self
    }
}

/// Shared, mutable configuration of a `RequestClient`.
///
/// Cloning the store clones the handle, not the configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    inner: Arc<RwLock<ClientConfig>>,
}

impl ConfigStore {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Deep-merge `patch` into the stored configuration.
    pub fn apply(&self, patch: ConfigPatch) {
        let mut config = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        config.apply(patch);
        tracing::debug!(base_url = %config.base_url(), "configuration updated");
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> ClientConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn base_url(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .base_url()
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
