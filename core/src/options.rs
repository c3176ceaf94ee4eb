//! Per-call request options.
//!
//! # Design
//! `RequestOptions` lives for one call. Options objects combine with a
//! shallow merge: a field set on the overriding side replaces the whole
//! field, header map included. Header maps are only combined key by key
//! later, when the client layers options over the configured headers.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::config::ContentType;
use crate::error::Error;
use crate::normalize::{JsonMode, ResponseFilter};

/// Request body supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured data, encoded as JSON or form fields on send.
    Json(Value),
    /// Bytes sent as-is.
    Raw(Bytes),
}

impl Payload {
    /// Structured payload from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Encode for the wire. Raw payloads ignore `content_type`.
    pub fn encode(&self, content_type: ContentType) -> Result<Bytes, Error> {
        match (self, content_type) {
            (Payload::Raw(bytes), _) => Ok(bytes.clone()),
            (Payload::Json(value), ContentType::Json) => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| Error::Serialization(e.to_string())),
            (Payload::Json(value), ContentType::Form) => encode_form(value).map(Bytes::from),
        }
    }
}

/// Options for a single request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub headers: Option<BTreeMap<String, String>>,
    pub payload: Option<Payload>,
    pub response_filter: Option<ResponseFilter>,
    pub content_type: Option<ContentType>,
    pub json: Option<JsonMode>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow merge: every field set in `overrides` replaces the field here.
    pub fn merge(self, overrides: RequestOptions) -> RequestOptions {
        RequestOptions {
            headers: overrides.headers.or(self.headers),
            payload: overrides.payload.or(self.payload),
            response_filter: overrides.response_filter.or(self.response_filter),
            content_type: overrides.content_type.or(self.content_type),
            json: overrides.json.or(self.json),
            timeout: overrides.timeout.or(self.timeout),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Structured payload from a JSON value.
    pub fn json_payload(self, value: Value) -> Self {
        self.payload(Payload::Json(value))
    }

    pub fn response_filter(mut self, filter: ResponseFilter) -> Self {
        self.response_filter = Some(filter);
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn json_mode(mut self, mode: JsonMode) -> Self {
        self.json = Some(mode);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// URL-encode the top-level fields of an object. Arrays repeat the key,
/// `null` becomes an empty value, nested objects are rejected.
fn encode_form(value: &Value) -> Result<String, Error> {
    let Value::Object(fields) = value else {
        return Err(Error::Serialization(
            "form payload must be a JSON object".to_string(),
        ));
    };

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, field) in fields {
        match field {
            Value::Array(items) => {
                for item in items {
                    serializer.append_pair(key, &form_scalar(key, item)?);
                }
            }
            other => {
                serializer.append_pair(key, &form_scalar(key, other)?);
            }
        }
    }
    Ok(serializer.finish())
}

fn form_scalar(key: &str, value: &Value) -> Result<String, Error> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) | Value::Object(_) => Err(Error::Serialization(format!(
            "form field `{key}` cannot hold nested values"
        ))),
    }
}
