//! Opt-in error diagnostics.
//!
//! A `RequestClient` reports every error it returns to an attached
//! `ErrorSink`. Nothing is recorded unless a sink is attached, and the sink
//! never influences control flow.

use std::sync::{Mutex, PoisonError};

use crate::error::Error;

/// Receives every error a client returns.
pub trait ErrorSink: Send + Sync {
    fn record(&self, error: &Error);
}

/// Keeps the most recent error. Each failure overwrites the previous one;
/// the slot is never cleared automatically.
#[derive(Debug, Default)]
pub struct LastErrorSlot {
    last: Mutex<Option<Error>>,
}

impl LastErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_error(&self) -> Option<Error> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorSink for LastErrorSlot {
    fn record(&self, error: &Error) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
    }
}
