//! Response body normalization.
//!
//! # Design
//! A body is parsed once into `serde_json::Value`, handed to an optional
//! `ResponseFilter` that edits it in place, and returned as structure. No
//! re-serialization happens between the filter and the caller.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;

/// How a response body is decoded when no filter forces JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonMode {
    /// Always parse as JSON; invalid JSON is an error.
    #[default]
    Force,
    /// Parse only when the response declares a JSON content type.
    Auto,
    /// Never parse; bodies are returned as raw bytes.
    Off,
}

/// Accepts `"force"`, `"auto"`, `"off"`, or a bool (`true` is `auto`).
impl<'de> Deserialize<'de> for JsonMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Named(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Ok(JsonMode::Auto),
            Repr::Flag(false) => Ok(JsonMode::Off),
            Repr::Named(name) => match name.as_str() {
                "force" => Ok(JsonMode::Force),
                "auto" => Ok(JsonMode::Auto),
                "off" => Ok(JsonMode::Off),
                other => Err(D::Error::custom(format!("unknown json mode `{other}`"))),
            },
        }
    }
}

/// Caller-supplied transformation applied to a parsed body.
#[derive(Clone)]
pub struct ResponseFilter(Arc<dyn Fn(&mut Value) + Send + Sync>);

impl ResponseFilter {
    pub fn new(f: impl Fn(&mut Value) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &mut Value) {
        (self.0)(value)
    }
}

impl fmt::Debug for ResponseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseFilter(..)")
    }
}

/// Two filters are equal when they share the same closure.
impl PartialEq for ResponseFilter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A response body as handed to the caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Raw(Bytes),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize the body into `T`. An empty body deserializes from `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match self {
            Body::Empty => Ok(serde_json::from_value(Value::Null)?),
            Body::Json(value) => Ok(T::deserialize(value)?),
            Body::Raw(bytes) => Ok(serde_json::from_slice(bytes)?),
        }
    }

    /// Body rendered as text; JSON is re-serialized compactly.
    pub fn to_text(&self) -> String {
        match self {
            Body::Empty => String::new(),
            Body::Json(value) => value.to_string(),
            Body::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Decode a successful response body.
///
/// Empty bodies skip the filter. A filter always gets parsed JSON, whatever
/// the mode.
pub fn normalize(
    raw: &Bytes,
    content_type: Option<&str>,
    mode: JsonMode,
    filter: Option<&ResponseFilter>,
) -> Result<Body, Error> {
    if raw.is_empty() {
        return Ok(Body::Empty);
    }
    if let Some(filter) = filter {
        let mut value: Value = serde_json::from_slice(raw)?;
        filter.apply(&mut value);
        return Ok(Body::Json(value));
    }
    if wants_json(content_type, mode) {
        Ok(Body::Json(serde_json::from_slice(raw)?))
    } else {
        Ok(Body::Raw(raw.clone()))
    }
}

/// Decode a failure payload. Never fails: undecodable bodies stay raw so the
/// status error is what the caller sees.
pub fn lenient(raw: &Bytes, content_type: Option<&str>, mode: JsonMode) -> Body {
    if raw.is_empty() {
        return Body::Empty;
    }
    if wants_json(content_type, mode) {
        if let Ok(value) = serde_json::from_slice(raw) {
            return Body::Json(value);
        }
    }
    Body::Raw(raw.clone())
}

fn wants_json(content_type: Option<&str>, mode: JsonMode) -> bool {
    match mode {
        JsonMode::Force => true,
        JsonMode::Auto => content_type.is_some_and(is_json_content_type),
        JsonMode::Off => false,
    }
}

fn is_json_content_type(value: &str) -> bool {
    let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}
