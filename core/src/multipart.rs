//! Multipart form bodies and upload observers.
//!
//! # Design
//! Upload hooks are observers only. They see progress, completion and
//! transport failure, but never change how the upload is reported to the
//! caller.

use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

type ProgressFn = dyn Fn(u64, u64) + Send + Sync;
type LoadFn = dyn Fn(u16) + Send + Sync;
type ErrorFn = dyn Fn(&str) + Send + Sync;

/// Observers attached to an upload.
#[derive(Clone, Default)]
pub struct UploadHooks {
    on_progress: Option<Arc<ProgressFn>>,
    on_load: Option<Arc<LoadFn>>,
    on_error: Option<Arc<ErrorFn>>,
}

impl UploadHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(bytes_sent, bytes_total)` as the body is written.
    pub fn on_progress(mut self, f: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    /// Called with the response status once the upload completes.
    pub fn on_load(mut self, f: impl Fn(u16) + Send + Sync + 'static) -> Self {
        self.on_load = Some(Arc::new(f));
        self
    }

    /// Called with the transport's message when the upload fails.
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn progress(&self, sent: u64, total: u64) {
        if let Some(f) = &self.on_progress {
            f(sent, total);
        }
    }

    pub fn load(&self, status: u16) {
        if let Some(f) = &self.on_load {
            f(status);
        }
    }

    pub fn error(&self, message: &str) {
        if let Some(f) = &self.on_error {
            f(message);
        }
    }
}

impl fmt::Debug for UploadHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadHooks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A `multipart/form-data` body under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Encode with a fresh random boundary. Returns `(boundary, body)`.
    pub fn encode(&self) -> (String, Bytes) {
        let boundary = format!("courier-{}", Uuid::new_v4().simple());
        let body = self.encode_with_boundary(&boundary);
        (boundary, body)
    }

    pub fn encode_with_boundary(&self, boundary: &str) -> Bytes {
        let mut buf = BytesMut::new();
        for part in &self.parts {
            buf.put_slice(format!("--{boundary}\r\n").as_bytes());
            let mut disposition = format!("form-data; name=\"{}\"", quote(&part.name));
            if let Some(filename) = &part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", quote(filename)));
            }
            buf.put_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
            if let Some(content_type) = &part.content_type {
                buf.put_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            buf.put_slice(b"\r\n");
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(format!("--{boundary}--\r\n").as_bytes());
        buf.freeze()
    }
}

fn quote(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn encodes_text_and_file_parts() {
        let form = MultipartForm::new()
            .text("title", "report")
            .file("upload", "a.txt", "text/plain", Bytes::from_static(b"hello"));
        let body = form.encode_with_boundary("XYZ");
        let expected = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\
            \r\n\
            report\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            hello\r\n\
            --XYZ--\r\n";
        assert_eq!(body, Bytes::from(expected));
    }

    #[test]
    fn quotes_are_escaped_in_names() {
        let form = MultipartForm::new().text("we\"ird", "v");
        let body = form.encode_with_boundary("B");
        assert!(String::from_utf8_lossy(&body).contains("name=\"we%22ird\""));
    }

    #[test]
    fn random_boundaries_differ() {
        let form = MultipartForm::new().text("a", "b");
        let (first, _) = form.encode();
        let (second, _) = form.encode();
        assert_ne!(first, second);
        assert!(first.starts_with("courier-"));
    }

    #[test]
    fn hooks_without_observers_are_silent() {
        let hooks = UploadHooks::new();
        hooks.progress(1, 2);
        hooks.load(200);
        hooks.error("boom");
    }

    #[test]
    fn hooks_forward_events() {
        let sent = Arc::new(AtomicU64::new(0));
        let seen = sent.clone();
        let hooks = UploadHooks::new().on_progress(move |s, _| seen.store(s, Ordering::SeqCst));
        hooks.progress(42, 100);
        assert_eq!(sent.load(Ordering::SeqCst), 42);
    }
}
