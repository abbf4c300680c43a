//! The transport-facing request object handed to hooks and route handlers.
//!
//! A [`Request`] is what the accept path produces after reading one HTTP/1.1
//! request off the socket: the parsed method, the raw path, the header list,
//! and the body bytes. It deliberately does no URL decoding and no
//! path-pattern matching; both belong to the collaborators around this layer.

use crate::error::{Error, Result};
use crate::method::Method;
use bytes::Bytes;
use serde::de::DeserializeOwned;

/// One parsed HTTP request.
///
/// Cheap to clone: the body is reference-counted [`Bytes`], so hooks that
/// decline a request cost one header-list copy on the way through.
///
/// # Examples
///
/// ```
/// use hookwire_core::{Method, Request};
///
/// let req = Request::new(Method::Get, "/status.json", vec![], b"".as_ref());
/// assert_eq!(req.method(), Method::Get);
/// assert_eq!(req.path(), "/status.json");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    /// Builds a request from its parts.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers: Vec<(String, String)>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body: body.into(),
        }
    }

    /// Parses a request head (request line plus header lines, no body).
    ///
    /// The head is everything up to and excluding the blank line. The body is
    /// attached separately with [`Request::with_body`] once the accept path
    /// has read `Content-Length` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for a garbled request line and
    /// [`Error::InvalidMethod`] for verbs outside the supported set.
    pub fn parse_head(head: &str) -> Result<Self> {
        let mut lines = head.split("\r\n");
        let request_line = lines
            .next()
            .ok_or_else(|| Error::bad_request("empty request head"))?;

        let mut parts = request_line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| Error::bad_request("missing method"))?;
        let method = Method::parse(verb)?;
        let path = parts
            .next()
            .ok_or_else(|| Error::bad_request("missing request path"))?
            .to_string();

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::bad_request(format!("malformed header line: {line}")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self {
            method,
            path,
            headers,
            body: Bytes::new(),
        })
    }

    /// Attaches the body read from the socket.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The raw request path, exactly as the client sent it.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks up a header value by name, case-insensitively.
    ///
    /// Returns the first matching header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers in arrival order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The declared body length, or zero when absent or unparseable.
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// The request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserializes the body as JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use hookwire_core::{Method, Request};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Login {
    ///     user: String,
    /// }
    ///
    /// let req = Request::new(Method::Post, "/login", vec![], r#"{"user":"ada"}"#);
    /// let login: Login = req.json().unwrap();
    /// assert_eq!(login.user, "ada");
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
