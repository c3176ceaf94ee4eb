//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! The C side only ever sees an opaque `FfiClient`, plain enums with
//! explicit discriminants, and NUL-terminated strings. Conversions between
//! these and the core types live here so `lib.rs` stays focused on the
//! `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use courier_core::{
    ClientConfig, ClientResponse, Error, HttpMethod, LastErrorSlot, RequestClient,
    ReqwestTransport,
};
use tokio::runtime::Runtime;

/// Opaque handle to a request client. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiClient {
    pub(crate) inner: RequestClient<ReqwestTransport>,
    pub(crate) runtime: Runtime,
    pub(crate) last_error: Arc<LastErrorSlot>,
}

impl FfiClient {
    pub(crate) fn new(config: ClientConfig) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let last_error = Arc::new(LastErrorSlot::new());
        let inner = RequestClient::with_reqwest(config).with_error_sink(last_error.clone());
        Ok(Self {
            inner,
            runtime,
            last_error,
        })
    }
}

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Delete => HttpMethod::Delete,
        }
    }
}

/// Return codes of the FFI functions that do not hand back a pointer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiStatus {
    Ok = 0,
    NullArg = 1,
    InvalidUtf8 = 2,
    InvalidConfig = 3,
    Panic = 4,
}

/// Completion callback of a request.
///
/// Invoked exactly once per accepted request. On success `error` is null,
/// `payload` is the response body as text and `status` the HTTP status.
/// On failure `error` is the error message; `payload` carries the response
/// body of a status error and is null otherwise, and `status` is 0 when no
/// response was received. Both strings are only valid for the duration of
/// the call.
pub type FfiCallback = Option<
    extern "C" fn(user_data: *mut c_void, error: *const c_char, payload: *const c_char, status: u16),
>;

/// Outcome of a request, flattened into what the callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Completion {
    pub error: Option<String>,
    pub payload: Option<String>,
    pub status: u16,
}

impl Completion {
    pub(crate) fn from_result(result: Result<ClientResponse, Error>) -> Self {
        match result {
            Ok(response) => Completion {
                error: None,
                payload: Some(response.body.to_text()),
                status: response.status,
            },
            Err(err) => Completion {
                error: Some(err.to_string()),
                payload: err.body().map(|body| body.to_text()),
                status: err.status().unwrap_or(0),
            },
        }
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Completion {
            error: Some(message.into()),
            payload: None,
            status: 0,
        }
    }

    /// Hand the outcome to `cb`. The strings are dropped once it returns.
    pub(crate) fn deliver(self, cb: extern "C" fn(*mut c_void, *const c_char, *const c_char, u16), user_data: *mut c_void) {
        let error = self.error.map(c_string);
        let payload = self.payload.map(c_string);
        cb(
            user_data,
            error.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            payload.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            self.status,
        );
    }
}

/// Interior NUL bytes cannot cross into C; they are dropped.
pub(crate) fn c_string(s: String) -> CString {
    CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}

/// Transfer ownership of `s` to the C caller, who frees it with
/// `courier_free_string`.
pub(crate) fn into_raw_string(s: String) -> *mut c_char {
    c_string(s).into_raw()
}
