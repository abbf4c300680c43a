//! Deploy-time server configuration.
//!
//! None of these knobs are runtime-mutable: the config is consumed when the
//! server starts and stays fixed until it stops.

use std::time::Duration;

/// Configuration for an [`HttpApp`](crate::server::HttpApp).
///
/// # Examples
///
/// ```
/// use hookwire_core::ServerConfig;
///
/// let config = ServerConfig::new("127.0.0.1:8080")
///     .with_base_path("/app")
///     .with_ws_path("/app/ws")
///     .with_purge_on_full(true)
///     .with_max_connections(32);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds, e.g. `"0.0.0.0:8080"`. Port 0 asks the OS
    /// for a free port; the bound address is observable via `local_addr()`.
    pub bind_addr: String,
    /// Prefix under which the builtin routes live. Empty means server root.
    pub base_path: String,
    /// URI path that accepts websocket upgrade handshakes.
    pub ws_path: String,
    /// When the connection slot table is full: `true` evicts the
    /// least-recently-seen connection to admit a new one, `false` rejects
    /// the newcomer with 503.
    pub purge_on_full: bool,
    /// Capacity of the websocket connection slot table.
    pub max_connections: usize,
    /// Largest payload accepted by the outbound send operation. Larger
    /// payloads fail instead of being silently fragmented.
    pub max_frame_size: usize,
    /// Largest request head (request line plus headers) accepted.
    pub max_head_size: usize,
    /// How long the accept path waits for a request head before giving up
    /// on the socket.
    pub accept_timeout: Duration,
}

impl ServerConfig {
    /// Creates a config with defaults for everything but the bind address.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            base_path: String::new(),
            ws_path: "/ws".to_string(),
            purge_on_full: false,
            max_connections: 16,
            max_frame_size: 64 * 1024,
            max_head_size: 8 * 1024,
            accept_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the base path for builtin routes. A trailing `/` is stripped so
    /// route joins stay predictable.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        let mut p = base_path.into();
        while p.ends_with('/') {
            p.pop();
        }
        self.base_path = p;
        self
    }

    /// Sets the websocket upgrade path.
    pub fn with_ws_path(mut self, ws_path: impl Into<String>) -> Self {
        self.ws_path = ws_path.into();
        self
    }

    /// Sets the full-table eviction policy.
    pub fn with_purge_on_full(mut self, purge: bool) -> Self {
        self.purge_on_full = purge;
        self
    }

    /// Sets the connection slot table capacity.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the outbound frame size limit.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Joins a route path under the base path.
    pub(crate) fn routed_path(&self, path: &str) -> String {
        format!("{}{}", self.base_path, path)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:8080")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.ws_path, "/ws");
        assert!(!config.purge_on_full);
        assert_eq!(config.max_connections, 16);
        assert!(config.base_path.is_empty());
    }

    #[test]
    fn test_base_path_trailing_slash_stripped() {
        let config = ServerConfig::new("127.0.0.1:0").with_base_path("/app/");
        assert_eq!(config.base_path, "/app");
        assert_eq!(config.routed_path("/status.json"), "/app/status.json");
    }

    #[test]
    fn test_routed_path_at_root() {
        let config = ServerConfig::default();
        assert_eq!(config.routed_path("/status.json"), "/status.json");
    }
}
