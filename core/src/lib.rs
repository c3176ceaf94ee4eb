//! Client-side convenience layer over HTTP.
//!
//! # Overview
//! `RequestClient` issues GET/POST/PUT/DELETE and multipart requests through
//! an injected `Transport`, decides success or failure from the status code
//! per verb, and runs an optional filter over parsed response bodies.
//!
//! # Design
//! - Configuration is a `ClientConfig` behind a shared `ConfigStore`;
//!   updates are `ConfigPatch` values merged deeply (headers key by key).
//! - Per-call `RequestOptions` merge shallowly over method defaults.
//! - Each call splits into `build` (plain `HttpRequest`), the transport
//!   round-trip, and `parse` (classification plus normalization), so the
//!   decision logic is testable without I/O.
//! - Errors are values: `Error::ClientRequest` for transport failures,
//!   `Error::Status` for unexpected status codes, and precondition errors
//!   raised before the transport is touched.

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod http;
pub mod multipart;
pub mod normalize;
pub mod options;
pub mod path;
pub mod query;
pub mod status;
pub mod transport;

pub use client::{ClientResponse, PreparedRequest, RequestClient};
pub use config::{ClientConfig, ConfigPatch, ConfigStore, ContentType};
pub use diagnostics::{ErrorSink, LastErrorSlot};
pub use error::Error;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use multipart::{MultipartForm, UploadHooks};
pub use normalize::{Body, JsonMode, ResponseFilter};
pub use options::{Payload, RequestOptions};
pub use path::PathTemplate;
pub use query::{query_string, QueryParams, QueryValue};
pub use status::{classify, success_codes, Classification};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
