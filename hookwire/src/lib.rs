//! # Hookwire - Embeddable Hook-Dispatch HTTP/WebSocket Layer
//!
//! Hookwire is an application layer for systems that embed a small HTTP
//! server and need to customize it from the outside: per-method request
//! hooks that override builtin routes, a managed start/stop lifecycle, and
//! websocket push to specific connected clients by connection identifier.
//!
//! This crate is a thin facade over [`hookwire_core`]; see that crate for
//! the full documentation of each module.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hookwire::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let app = HttpApp::new(ServerConfig::new("127.0.0.1:8080"));
//!     app.start().await?;
//!
//!     // Override every GET until the hook is removed again.
//!     app.set_method_hook(Method::Get, Some(hook(|_req: Request| async {
//!         Ok(HookOutcome::Handled(Response::text("hooked")))
//!     })))?;
//!
//!     app.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `websocket` (default): compiles in the upgrade route, the connection
//!   table, and the outbound send surface.

#![warn(missing_docs)]

pub use hookwire_core::*;

/// Re-export of the core prelude.
pub mod prelude {
    pub use hookwire_core::prelude::*;
}
