//! Bundled `Transport` implementations.
//!
//! Any type implementing [`crate::http::Transport`] can back a
//! `RequestClient`; the ones here cover the common case.

#[cfg(feature = "reqwest")]
mod reqwest_backend;

#[cfg(feature = "reqwest")]
pub use reqwest_backend::ReqwestTransport;
