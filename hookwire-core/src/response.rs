//! The response object written back to the transport.
//!
//! A [`Response`] pairs an [`http::StatusCode`] with a content type and a body
//! and knows how to serialize itself as a single HTTP/1.1 response with
//! `Connection: close`, which is the only connection mode this layer speaks
//! for plain requests.

use crate::error::Result;
use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

/// One HTTP response produced by a hook or a route handler.
///
/// # Examples
///
/// ```
/// use hookwire_core::Response;
/// use http::StatusCode;
///
/// let resp = Response::new(StatusCode::CREATED).with_body("hooked");
/// assert_eq!(resp.status(), StatusCode::CREATED);
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    content_type: String,
    body: Bytes,
}

impl Response {
    /// Creates an empty response with the given status and `text/plain` body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: Bytes::new(),
        }
    }

    /// A `200 OK` with no body.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// A `200 OK` with a plain-text body.
    pub fn text(body: impl Into<Bytes>) -> Self {
        Self::ok().with_body(body)
    }

    /// A `200 OK` with a JSON body serialized from `data`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hookwire_core::Response;
    /// use serde_json::json;
    ///
    /// let resp = Response::json(&json!({"status": "up"})).unwrap();
    /// assert_eq!(resp.content_type(), "application/json");
    /// ```
    pub fn json<T: Serialize>(data: &T) -> Result<Self> {
        let body = serde_json::to_vec(data)?;
        Ok(Self::ok()
            .with_content_type("application/json")
            .with_body(body))
    }

    /// The default response for a path no builtin route claims.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND).with_body("not found")
    }

    /// The well-formed response produced when a handler fails.
    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR).with_body("internal server error")
    }

    /// Sent when the connection slot table is full and purging is disabled.
    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE).with_body("connection table full")
    }

    /// Sent when the request head cannot be parsed.
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST).with_body("bad request")
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The content type that will be written.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the complete HTTP/1.1 response, head and body.
    pub fn into_bytes(self) -> Vec<u8> {
        let reason = self.status.canonical_reason().unwrap_or("Unknown");
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n",
            self.status.as_u16(),
            reason,
            self.content_type,
            self.body.len()
        );

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}
