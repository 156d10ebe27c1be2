//! The response triple produced by dispatch.

use bytes::{Bytes, BytesMut};
use http::StatusCode;

/// A response: status code, ordered header pairs, and a body as an
/// ordered sequence of byte chunks.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<Bytes>,
}

impl Response {
    /// An empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// A 200 text/plain response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::text(StatusCode::OK, body)
    }

    /// A text/plain response with the given status.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain")
            .with_body(body)
    }

    /// Append a header pair.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a body chunk.
    pub fn with_body(mut self, chunk: impl Into<Bytes>) -> Self {
        self.body.push(chunk.into());
        self
    }

    /// First value of the named header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body chunks concatenated.
    pub fn body_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for chunk in &self.body {
            buf.extend_from_slice(chunk);
        }
        buf.freeze()
    }

    /// The concatenated body, lossily decoded for assertions and logs.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes()).into_owned()
    }

    /// The 404 produced when no pattern matches: carries the cascade
    /// header so a containing stack may try other handlers.
    pub(crate) fn not_found(path: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND)
            .with_header("Content-Type", "text/plain")
            .with_header("X-Cascade", "pass")
            .with_body(format!("Not Found: {path}"))
    }

    /// The 501 produced when a pattern matches but the method has no
    /// registered target; the body names the methods that do.
    pub(crate) fn not_implemented(allowed: &[String]) -> Self {
        Self::text(
            StatusCode::NOT_IMPLEMENTED,
            format!(
                "Resource found but it can be accessed only through {}",
                allowed.join(", ")
            ),
        )
    }
}
