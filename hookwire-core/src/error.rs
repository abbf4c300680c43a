//! Error types and result handling for Hookwire.
//!
//! A single [`Error`] enum covers everything that can go wrong in the
//! application layer, from caller bugs (registering a hook for an unsupported
//! method, starting a server twice) to expected runtime churn (sending to a
//! connection that has already gone away).
//!
//! # Error Categories
//!
//! - **Caller bugs**: [`Error::InvalidMethod`], [`Error::AlreadyRunning`].
//!   Reported synchronously, never retried internally.
//! - **Connection churn**: [`Error::NotConnected`], [`Error::Transport`].
//!   Expected under normal operation; the caller should drop the send and
//!   treat the connection as dead.
//! - **Protocol / IO**: [`Error::WebSocket`], [`Error::Io`],
//!   [`Error::BadRequest`], [`Error::Json`].
//!
//! None of these are fatal to the listening task. A failed hook or send is
//! returned to its immediate caller and the server keeps serving.
//!
//! # Examples
//!
//! ```
//! use hookwire_core::{Error, Result};
//!
//! fn classify(result: Result<()>) {
//!     match result {
//!         Ok(_) => println!("sent"),
//!         Err(Error::NotConnected(id)) => {
//!             // Normal churn: the client disconnected. Drop the send.
//!             println!("connection {} is gone", id);
//!         }
//!         Err(Error::Transport(reason)) => {
//!             // The connection is dead now; a retry would get NotConnected.
//!             println!("write failed: {}", reason);
//!         }
//!         Err(e) => println!("unexpected: {}", e),
//!     }
//! }
//! ```

use crate::ConnectionId;
use thiserror::Error;

/// The main error type for Hookwire operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Hook registration named a verb outside the supported set.
    ///
    /// The transport only understands a fixed enumeration of methods; this is
    /// a caller bug and has no effect on dispatch.
    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// `start()` was called while the server was already running.
    #[error("server is already running")]
    AlreadyRunning,

    /// A send targeted a connection identifier that is not currently open.
    ///
    /// This is expected whenever clients churn: the identifier may belong to
    /// a connection that closed, was evicted, or never completed its upgrade.
    #[error("connection {0} is not connected")]
    NotConnected(ConnectionId),

    /// A frame write failed on an apparently-open connection, or the payload
    /// exceeded the transport frame limit.
    ///
    /// Either way the connection is dead by the time this is returned; its
    /// table entry has already been removed, so a retry with the same
    /// identifier deterministically yields [`Error::NotConnected`].
    #[error("transport error: {0}")]
    Transport(String),

    /// WebSocket protocol error from the tungstenite layer.
    #[cfg(feature = "websocket")]
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// I/O error from the listener or a connection socket.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer sent a request head this layer could not parse.
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// Application-defined error raised from a hook or route handler.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Creates a custom application error.
    ///
    /// # Examples
    ///
    /// ```
    /// use hookwire_core::Error;
    ///
    /// let err = Error::custom("username cannot be empty");
    /// assert_eq!(err.to_string(), "username cannot be empty");
    /// ```
    pub fn custom(msg: impl Into<String>) -> Self {
        Error::Custom(msg.into())
    }

    /// Creates a transport error from a failed wire operation.
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Creates a bad-request error from a parse failure.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}

/// A specialized `Result` type for Hookwire operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_method_display() {
        let err = Error::InvalidMethod("BREW".to_string());
        assert_eq!(err.to_string(), "unsupported HTTP method: BREW");
    }

    #[test]
    fn test_not_connected_carries_id() {
        let err = Error::NotConnected(42);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_custom_error() {
        let err = Error::custom("something odd");
        assert!(matches!(err, Error::Custom(_)));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
