//! # Hookwire Core - Hook-Dispatch HTTP Application Layer
//!
//! `hookwire-core` is an embeddable application layer that sits on top of a
//! plain TCP/HTTP transport and adds the three things an embedding system
//! usually ends up hand-rolling:
//!
//! - a managed **start/stop lifecycle** for the listening task,
//! - **per-method hooks** that transparently override the builtin routes
//!   without touching the route table, and
//! - optional **websocket push**: any component can deliver a frame to one
//!   specific connected client, addressed by its connection identifier,
//!   entirely outside the request/response cycle that opened the connection.
//!
//! It is deliberately not a web framework: there is no path-pattern routing,
//! no middleware stack, no TLS, and no static file serving. It is the policy
//! layer that customizes a server, not the server.
//!
//! ## The hook chain
//!
//! Every request is first offered to the [`RequestHook`] installed for its
//! method, if any. The hook either produces the response
//! ([`HookOutcome::Handled`]) or declines ([`HookOutcome::NotHandled`]), in
//! which case the builtin route runs as if no hook existed. Hook overrides,
//! default underlies.
//!
//! ## Quick start
//!
//! ```no_run
//! use hookwire_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let app = HttpApp::new(ServerConfig::new("127.0.0.1:8080"))
//!         .route(Method::Get, "/hello", handler(|_req: Request| async {
//!             Ok(Response::text("hello"))
//!         }));
//!
//!     app.start().await?;
//!
//!     // ... the embedding system runs; hooks can be swapped at any time ...
//!
//!     app.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Websocket push
//!
//! With the default `websocket` feature, upgrade handshakes on the configured
//! path are accepted and tracked in a connection table. The connect hook
//! hands the embedder each new connection's identifier; later, any task can
//! push to it:
//!
//! ```
//! use hookwire_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(app: HttpApp) -> Result<()> {
//! let app2 = app.clone();
//! app.set_connect_hook(Some(Arc::new(move |id| {
//!     // Runs inline with connection setup; keep it brief.
//!     let app = app2.clone();
//!     tokio::spawn(async move {
//!         let _ = app.send(id, Payload::text("welcome")).await;
//!     });
//! })));
//! # Ok(())
//! # }
//! ```
//!
//! A send is a single best-effort frame: no queuing, no retry. A failed send
//! removes the connection from the table before the error returns, so a
//! retry with the same identifier deterministically reports
//! [`Error::NotConnected`].
//!
//! ## Module Structure
//!
//! - [`server`]: lifecycle controller, accept loop, dispatch
//! - [`hook`]: method hooks, route handlers, the hook registry
//! - [`connection`]: connection table and outbound sends (`websocket`)
//! - [`payload`]: websocket payloads (`websocket`)
//! - [`request`] / [`response`]: the transport-facing request and response
//! - [`method`]: the finite supported method set
//! - [`config`]: deploy-time configuration
//! - [`error`]: error types and result handling

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
#[cfg(feature = "websocket")]
pub mod connection;
pub mod error;
pub mod hook;
pub mod method;
#[cfg(feature = "websocket")]
pub mod payload;
pub mod request;
pub mod response;
pub mod server;

/// An opaque identifier addressing one open transport connection.
///
/// Assigned when a websocket upgrade completes and valid exactly as long as
/// that connection stays open. Identifiers are never reused within the
/// lifetime of a connection table.
pub type ConnectionId = u64;

pub use config::ServerConfig;
#[cfg(feature = "websocket")]
pub use connection::{ConnectHook, ConnectionTable, MessageHook};
pub use error::{Error, Result};
pub use hook::{handler, hook, Handler, HookOutcome, HookRegistry, RequestHook};
pub use method::Method;
#[cfg(feature = "websocket")]
pub use payload::{Payload, PayloadKind};
pub use request::Request;
pub use response::Response;
pub use server::HttpApp;

/// Commonly used types and traits for Hookwire applications.
///
/// # Examples
///
/// ```
/// use hookwire_core::prelude::*;
///
/// async fn my_route(_req: Request) -> Result<Response> {
///     Ok(Response::text("ok"))
/// }
///
/// # fn example() {
/// let app = HttpApp::new(ServerConfig::default())
///     .route(Method::Get, "/my-route", handler(my_route));
/// # }
/// ```
pub mod prelude {
    pub use crate::config::ServerConfig;
    #[cfg(feature = "websocket")]
    pub use crate::connection::{ConnectHook, ConnectionTable, MessageHook};
    pub use crate::error::{Error, Result};
    pub use crate::hook::{handler, hook, Handler, HookOutcome, HookRegistry, RequestHook};
    pub use crate::method::Method;
    #[cfg(feature = "websocket")]
    pub use crate::payload::{Payload, PayloadKind};
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::server::HttpApp;
    pub use crate::ConnectionId;
}
