//! C-ABI wrapper around `courier-core`.
//!
//! # Overview
//! Exposes the request client through `extern "C"` functions so any
//! language with a C FFI can issue requests and receive the outcome through
//! a completion callback, without linking to Rust's async runtime directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Each `FfiClient` owns a current-thread tokio runtime. A request runs to
//!   completion on it before the call returns, and the callback fires once,
//!   on the calling thread.
//! - Configuration crosses the boundary as JSON: `courier_set_config` takes
//!   a partial config that is deep-merged, `courier_get_config` returns the
//!   resolved one.
//! - Strings returned by this library are owned by the caller and released
//!   with `courier_free_string`.

pub mod types;

use std::ffi::{c_void, CStr};
use std::fmt;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use courier_core::{
    ClientConfig, ConfigPatch, Error, ErrorSink, HttpMethod, Payload, QueryParams, QueryValue,
    RequestOptions,
};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use types::*;

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client sending requests to `endpoint` (host and optional port),
/// over https when `ssl` is true.
///
/// A JSON config in `COURIER_CONFIG` is merged on top when present.
/// Returns null if `endpoint` is null or not UTF-8, or if the runtime cannot
/// be started. The caller must free the returned pointer with
/// `courier_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn courier_client_new(endpoint: *const c_char, ssl: bool) -> *mut FfiClient {
    catch_unwind(|| {
        let Some(endpoint) = (unsafe { str_arg(endpoint) }) else {
            return std::ptr::null_mut();
        };
        let mut config = ClientConfig {
            endpoint: endpoint.to_string(),
            ssl,
            ..ClientConfig::default()
        };
        match ConfigPatch::from_env() {
            Ok(Some(patch)) => config.apply(patch),
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, "ignoring environment config"),
        }
        match FfiClient::new(config) {
            Ok(client) => Box::into_raw(Box::new(client)),
            Err(err) => {
                tracing::error!(%err, "failed to start client runtime");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `courier_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Deep-merge a JSON config patch into the client configuration.
///
/// Headers merge key by key; every other field present replaces the stored
/// value. Unknown fields are rejected with `InvalidConfig` and leave the
/// configuration untouched.
#[unsafe(no_mangle)]
pub extern "C" fn courier_set_config(client: *const FfiClient, patch_json: *const c_char) -> FfiStatus {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() || patch_json.is_null() {
            return FfiStatus::NullArg;
        }
        let client = unsafe { &*client };
        let Some(raw) = (unsafe { str_arg(patch_json) }) else {
            return FfiStatus::InvalidUtf8;
        };
        match ConfigPatch::from_json(raw) {
            Ok(patch) => {
                client.inner.set_config(patch);
                FfiStatus::Ok
            }
            Err(err) => {
                client.last_error.record(&err);
                FfiStatus::InvalidConfig
            }
        }
    }))
    .unwrap_or(FfiStatus::Panic)
}

/// Current configuration as JSON, or null if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_get_config(client: *const FfiClient) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match serde_json::to_string(&client.inner.get_config()) {
            Ok(json) => into_raw_string(json),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Issue a request and report its outcome through `cb`.
///
/// `path` is appended to the configured endpoint unless it is an absolute
/// http(s) URL. `body_json` may be null; otherwise it is sent as the
/// payload, encoded per the configured content type.
///
/// When `Ok` or `Panic` is returned, `cb` has been invoked exactly once.
/// Any other status means the arguments were rejected and `cb` was not
/// invoked.
#[unsafe(no_mangle)]
pub extern "C" fn courier_request(
    client: *const FfiClient,
    method: FfiHttpMethod,
    path: *const c_char,
    body_json: *const c_char,
    cb: FfiCallback,
    user_data: *mut c_void,
) -> FfiStatus {
    let Some(cb) = cb else {
        return FfiStatus::NullArg;
    };
    if client.is_null() || path.is_null() {
        return FfiStatus::NullArg;
    }

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let client = unsafe { &*client };
        let path = unsafe { str_arg(path) }.ok_or(FfiStatus::InvalidUtf8)?;
        let body = if body_json.is_null() {
            None
        } else {
            Some(unsafe { str_arg(body_json) }.ok_or(FfiStatus::InvalidUtf8)?)
        };
        Ok(run_request(client, method.into(), path, body))
    }));

    match outcome {
        Ok(Ok(completion)) => {
            completion.deliver(cb, user_data);
            FfiStatus::Ok
        }
        Ok(Err(status)) => status,
        Err(_) => {
            Completion::failed("panic in courier_request").deliver(cb, user_data);
            FfiStatus::Panic
        }
    }
}

/// `courier_request` with `GET` and no body.
#[unsafe(no_mangle)]
pub extern "C" fn courier_get(
    client: *const FfiClient,
    path: *const c_char,
    cb: FfiCallback,
    user_data: *mut c_void,
) -> FfiStatus {
    courier_request(client, FfiHttpMethod::Get, path, std::ptr::null(), cb, user_data)
}

/// `courier_request` with `POST`.
#[unsafe(no_mangle)]
pub extern "C" fn courier_post(
    client: *const FfiClient,
    path: *const c_char,
    body_json: *const c_char,
    cb: FfiCallback,
    user_data: *mut c_void,
) -> FfiStatus {
    courier_request(client, FfiHttpMethod::Post, path, body_json, cb, user_data)
}

/// `courier_request` with `PUT`.
#[unsafe(no_mangle)]
pub extern "C" fn courier_put(
    client: *const FfiClient,
    path: *const c_char,
    body_json: *const c_char,
    cb: FfiCallback,
    user_data: *mut c_void,
) -> FfiStatus {
    courier_request(client, FfiHttpMethod::Put, path, body_json, cb, user_data)
}

/// `courier_request` with `DELETE` and no body.
#[unsafe(no_mangle)]
pub extern "C" fn courier_delete(
    client: *const FfiClient,
    path: *const c_char,
    cb: FfiCallback,
    user_data: *mut c_void,
) -> FfiStatus {
    courier_request(client, FfiHttpMethod::Delete, path, std::ptr::null(), cb, user_data)
}

fn run_request(client: &FfiClient, method: HttpMethod, path: &str, body: Option<&str>) -> Completion {
    let mut options = RequestOptions::new();
    if let Some(raw) = body {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => options = options.payload(Payload::Json(value)),
            Err(e) => {
                let err = Error::InvalidArgument(format!("invalid payload: {e}"));
                client.last_error.record(&err);
                return Completion::from_result(Err(err));
            }
        }
    }
    let result = client
        .runtime
        .block_on(client.inner.send(method, path, options));
    Completion::from_result(result)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a query string (`?k=v&k2=a&k2=b`) from a JSON object.
///
/// Keys keep their order in the input. Arrays repeat the key, scalars are
/// rendered as text and null as an empty value. Returns null if `params_json`
/// is null or not an object of scalars and arrays of scalars.
#[unsafe(no_mangle)]
pub extern "C" fn courier_query_string(params_json: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        let Some(raw) = (unsafe { str_arg(params_json) }) else {
            return std::ptr::null_mut();
        };
        match serde_json::from_str::<OrderedParams>(raw) {
            Ok(OrderedParams(params)) => into_raw_string(params.to_query_string()),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Message of the most recent error on `client`, or null if none occurred.
#[unsafe(no_mangle)]
pub extern "C" fn courier_last_error(client: *const FfiClient) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        client
            .last_error
            .last_error()
            .map_or(std::ptr::null_mut(), |err| into_raw_string(err.to_string()))
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { std::ffi::CString::from_raw(s) });
        });
    }
}

/// Borrow a C string argument. `None` when null or not UTF-8.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// JSON object read into `QueryParams` without losing key order.
struct OrderedParams(QueryParams);

impl<'de> Deserialize<'de> for OrderedParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = OrderedParams;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of query parameters")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                use serde::de::Error as _;

                let mut params = QueryParams::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    let value = match value {
                        Value::Array(items) => QueryValue::Many(
                            items
                                .into_iter()
                                .map(scalar_text)
                                .collect::<Option<Vec<_>>>()
                                .ok_or_else(|| A::Error::custom(format!("nested value under `{key}`")))?,
                        ),
                        other => QueryValue::One(
                            scalar_text(other)
                                .ok_or_else(|| A::Error::custom(format!("nested value under `{key}`")))?,
                        ),
                    };
                    params.insert(key, value);
                }
                Ok(OrderedParams(params))
            }
        }

        deserializer.deserialize_map(ParamsVisitor)
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
