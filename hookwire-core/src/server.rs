//! The server context: lifecycle control, the accept loop, and dispatch.
//!
//! [`HttpApp`] owns everything with a lifetime tied to the server: the
//! [`HookRegistry`], the builtin route table, the websocket
//! [`ConnectionTable`], and the listening task itself. It is an explicit
//! context object rather than process-wide state; clone the handle freely and
//! hand it to whichever components need to install hooks or push frames.
//!
//! # Dispatch order
//!
//! For every plain request: the method hook runs first; if it returns
//! [`HookOutcome::Handled`] its response is written and nothing else runs.
//! Otherwise the builtin route table is consulted by exact `(method, path)`
//! match, and a missing route yields 404. Handler failures become well-formed
//! 500 responses; they never take down the listening task.
//!
//! # Examples
//!
//! ```
//! use hookwire_core::prelude::*;
//! use http::StatusCode;
//!
//! # async fn example() -> Result<()> {
//! let app = HttpApp::new(ServerConfig::new("127.0.0.1:0"))
//!     .route(Method::Get, "/hello", handler(|_req: Request| async {
//!         Ok(Response::text("hi"))
//!     }));
//!
//! app.start().await?;
//!
//! // Intercept every GET until further notice.
//! app.set_method_hook(Method::Get, Some(hook(|_req: Request| async {
//!     Ok(HookOutcome::Handled(
//!         Response::new(StatusCode::CREATED).with_body("hooked"),
//!     ))
//! })))?;
//!
//! // Back to the builtin routes.
//! app.set_method_hook(Method::Get, None)?;
//!
//! app.stop().await;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "websocket")]
use crate::connection::{drive_connection, ConnectHook, ConnectionTable, MessageHook};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::hook::{handler, Handler, HookOutcome, HookRegistry, RequestHook};
use crate::method::Method;
#[cfg(feature = "websocket")]
use crate::payload::Payload;
use crate::request::Request;
use crate::response::Response;
#[cfg(feature = "websocket")]
use crate::ConnectionId;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
#[cfg(feature = "websocket")]
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};

/// State held only while the server is running.
struct ActiveListener {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

struct Inner {
    config: ServerConfig,
    hooks: HookRegistry,
    routes: DashMap<(Method, String), Arc<dyn Handler>>,
    #[cfg(feature = "websocket")]
    table: Arc<ConnectionTable>,
    #[cfg(feature = "websocket")]
    connect_hook: std::sync::RwLock<Option<ConnectHook>>,
    #[cfg(feature = "websocket")]
    message_hook: std::sync::RwLock<Option<MessageHook>>,
    running: Mutex<Option<ActiveListener>>,
}

fn read_slot<T: Clone>(lock: &std::sync::RwLock<Option<T>>) -> Option<T> {
    lock.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write_slot<T>(lock: &std::sync::RwLock<Option<T>>, value: Option<T>) {
    *lock.write().unwrap_or_else(|e| e.into_inner()) = value;
}

/// The embeddable HTTP application layer.
///
/// Cheap to clone; all clones share the same registry, table, and lifecycle.
pub struct HttpApp {
    inner: Arc<Inner>,
}

impl HttpApp {
    /// Creates a stopped server context from a deploy-time config.
    ///
    /// One builtin route is installed up front: `GET {base_path}/status.json`
    /// reporting the number of open websocket connections.
    pub fn new(config: ServerConfig) -> Self {
        #[cfg(feature = "websocket")]
        let table = Arc::new(ConnectionTable::new(config.max_frame_size));

        let routes: DashMap<(Method, String), Arc<dyn Handler>> = DashMap::new();
        let status_path = config.routed_path("/status.json");

        #[cfg(feature = "websocket")]
        let status = {
            let table = table.clone();
            handler(move |_req: Request| {
                let connections = table.count();
                async move { Response::json(&serde_json::json!({ "connections": connections })) }
            })
        };
        #[cfg(not(feature = "websocket"))]
        let status = handler(|_req: Request| async {
            Response::json(&serde_json::json!({ "connections": 0 }))
        });
        routes.insert((Method::Get, status_path), status);

        Self {
            inner: Arc::new(Inner {
                config,
                hooks: HookRegistry::new(),
                routes,
                #[cfg(feature = "websocket")]
                table,
                #[cfg(feature = "websocket")]
                connect_hook: std::sync::RwLock::new(None),
                #[cfg(feature = "websocket")]
                message_hook: std::sync::RwLock::new(None),
                running: Mutex::new(None),
            }),
        }
    }

    /// Registers a builtin route under the configured base path.
    ///
    /// Matching is exact; there is no pattern syntax. Routes registered here
    /// are the default behavior a method hook can override.
    pub fn route(self, method: Method, path: &str, handler: Arc<dyn Handler>) -> Self {
        let full = self.inner.config.routed_path(path);
        self.inner.routes.insert((method, full), handler);
        self
    }

    /// Installs, replaces, or removes the hook consulted before the builtin
    /// routes for the given method.
    ///
    /// Accepts a [`Method`] or a verb name; an unsupported name fails with
    /// [`Error::InvalidMethod`] without touching dispatch.
    ///
    /// # Examples
    ///
    /// ```
    /// use hookwire_core::prelude::*;
    ///
    /// # fn example(app: &HttpApp) {
    /// let h = hook(|_req: Request| async { Ok(HookOutcome::NotHandled) });
    /// app.set_method_hook(Method::Post, Some(h)).unwrap();
    /// assert!(app.set_method_hook("BREW", None).is_err());
    /// # }
    /// ```
    pub fn set_method_hook<M>(&self, method: M, hook: Option<Arc<dyn RequestHook>>) -> Result<()>
    where
        M: TryInto<Method>,
        M::Error: Into<Error>,
    {
        let method = method.try_into().map_err(Into::into)?;
        self.inner.hooks.set(method, hook);
        Ok(())
    }

    /// Installs or removes the callback invoked when a client completes a
    /// websocket upgrade.
    ///
    /// The callback runs synchronously on the accepting task, before any data
    /// frame from that client is processed. Keep it brief; hand heavy work to
    /// `tokio::spawn`.
    #[cfg(feature = "websocket")]
    pub fn set_connect_hook(&self, hook: Option<ConnectHook>) {
        write_slot(&self.inner.connect_hook, hook);
    }

    /// Installs or removes the callback invoked for each inbound data frame.
    #[cfg(feature = "websocket")]
    pub fn set_message_hook(&self, hook: Option<MessageHook>) {
        write_slot(&self.inner.message_hook, hook);
    }

    /// Pushes one websocket frame to one specific connection.
    ///
    /// Asynchronous with respect to whatever request opened the connection;
    /// call it from anywhere in the embedding system. See
    /// [`ConnectionTable::send`] for the failure contract.
    #[cfg(feature = "websocket")]
    pub async fn send(&self, id: ConnectionId, payload: Payload) -> Result<()> {
        self.inner.table.send(id, payload).await
    }

    /// Raw-byte flavor of [`HttpApp::send`].
    #[cfg(feature = "websocket")]
    pub async fn send_raw(
        &self,
        id: ConnectionId,
        data: impl Into<bytes::Bytes>,
        is_text: bool,
    ) -> Result<()> {
        self.inner.table.send_raw(id, data, is_text).await
    }

    /// The number of open websocket connections.
    #[cfg(feature = "websocket")]
    pub fn connection_count(&self) -> usize {
        self.inner.table.count()
    }

    /// The identifiers of all open websocket connections.
    #[cfg(feature = "websocket")]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.inner.table.ids()
    }

    /// Starts the listening task.
    ///
    /// Binds the configured address, resets the hook registry and connection
    /// table to empty, and begins accepting connections.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if the server is running, or an
    /// [`Error::Io`] from binding the listener.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.inner.running.lock().await;
        if running.is_some() {
            return Err(Error::AlreadyRunning);
        }

        self.inner.hooks.clear();
        #[cfg(feature = "websocket")]
        self.inner.table.close_all().await;

        let listener = TcpListener::bind(&self.inner.config.bind_addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let task = tokio::spawn(accept_loop(inner, listener, shutdown_rx));

        *running = Some(ActiveListener {
            addr,
            shutdown,
            task,
        });
        info!("http app listening on {}", addr);
        Ok(())
    }

    /// Stops the listening task, closing every tracked connection and
    /// discarding all hooks. A no-op when not running; restart begins from
    /// empty state.
    pub async fn stop(&self) {
        let mut running = self.inner.running.lock().await;
        let Some(active) = running.take() else {
            debug!("stop called while not running");
            return;
        };

        let _ = active.shutdown.send(true);
        #[cfg(feature = "websocket")]
        self.inner.table.close_all().await;
        let _ = active.task.await;

        self.inner.hooks.clear();
        #[cfg(feature = "websocket")]
        {
            write_slot(&self.inner.connect_hook, None);
            write_slot(&self.inner.message_hook, None);
        }
        info!("http app stopped");
    }

    /// The address the listener is bound to, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.running.lock().await.as_ref().map(|a| a.addr)
    }

    /// Whether the listening task is running.
    pub async fn is_running(&self) -> bool {
        self.inner.running.lock().await.is_some()
    }
}

impl Clone for HttpApp {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

async fn accept_loop(
    inner: Arc<Inner>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("accept loop shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let inner = inner.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_socket(inner, stream, peer, shutdown).await {
                                debug!("connection from {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("accept failed: {}", e),
                }
            }
        }
    }
}

async fn handle_socket(
    inner: Arc<Inner>,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    // Peek rather than read: the websocket handshake needs the request
    // intact on the socket.
    let mut buf = [0u8; 1024];
    let n = tokio::time::timeout(inner.config.accept_timeout, stream.peek(&mut buf))
        .await
        .map_err(|_| Error::transport("timed out waiting for request head"))??;
    let head = String::from_utf8_lossy(&buf[..n]).into_owned();

    #[cfg(feature = "websocket")]
    if head.to_ascii_lowercase().contains("upgrade: websocket") {
        return handle_upgrade(inner, stream, peer, &head, shutdown).await;
    }
    #[cfg(not(feature = "websocket"))]
    let _ = (&head, &shutdown);

    handle_plain(inner, stream, peer).await
}

#[cfg(feature = "websocket")]
async fn handle_upgrade(
    inner: Arc<Inner>,
    stream: TcpStream,
    peer: SocketAddr,
    head: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    if path != inner.config.ws_path {
        warn!("upgrade attempt on {} from {} rejected", path, peer);
        return respond(stream, Response::not_found()).await;
    }

    if inner.config.max_connections > 0
        && inner.table.count() >= inner.config.max_connections
    {
        if inner.config.purge_on_full {
            inner.table.evict_lru().await;
        } else {
            warn!("connection table full, rejecting {}", peer);
            return respond(stream, Response::service_unavailable()).await;
        }
    }

    let ws = accept_async(stream).await?;
    let connect_hook = read_slot(&inner.connect_hook);
    let message_hook = read_slot(&inner.message_hook);
    drive_connection(ws, peer, inner.table.clone(), connect_hook, message_hook, shutdown).await;
    Ok(())
}

async fn handle_plain(inner: Arc<Inner>, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
    let request = match read_request(&inner.config, &mut stream).await {
        Ok(req) => req,
        Err(e) => {
            debug!("bad request from {}: {}", peer, e);
            return respond(stream, Response::bad_request()).await;
        }
    };

    debug!("{} {} from {}", request.method(), request.path(), peer);
    let response = dispatch(&inner, request).await;
    respond(stream, response).await
}

/// Hook first, builtin route second, 404 last. Handler failures become 500s.
async fn dispatch(inner: &Inner, request: Request) -> Response {
    if let Some(hook) = inner.hooks.get(request.method()) {
        match hook.handle(&request).await {
            Ok(HookOutcome::Handled(response)) => return response,
            Ok(HookOutcome::NotHandled) => {
                debug!("hook for {} declined, falling back", request.method());
            }
            Err(e) => {
                error!("hook for {} failed: {}", request.method(), e);
                return Response::internal_error();
            }
        }
    }

    let key = (request.method(), request.path().to_string());
    let handler = inner.routes.get(&key).map(|h| h.value().clone());
    match handler {
        Some(h) => match h.call(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("route handler failed: {}", e);
                Response::internal_error()
            }
        },
        None => Response::not_found(),
    }
}

async fn read_request(config: &ServerConfig, stream: &mut TcpStream) -> Result<Request> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > config.max_head_size {
            return Err(Error::bad_request("request head too large"));
        }
        let n = tokio::time::timeout(config.accept_timeout, stream.read(&mut chunk))
            .await
            .map_err(|_| Error::bad_request("timed out reading request head"))??;
        if n == 0 {
            return Err(Error::bad_request("connection closed mid-request"));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..head_end])
        .map_err(|_| Error::bad_request("request head is not valid utf-8"))?;
    let request = Request::parse_head(head)?;

    let content_length = request.content_length();
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = tokio::time::timeout(config.accept_timeout, stream.read(&mut chunk))
            .await
            .map_err(|_| Error::bad_request("timed out reading request body"))??;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(request.with_body(body))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn respond(mut stream: TcpStream, response: Response) -> Result<()> {
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await?;
    let _ = stream.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> HttpApp {
        HttpApp::new(ServerConfig::new("127.0.0.1:0"))
    }

    #[test]
    fn test_find_head_end() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(14));
        assert_eq!(find_head_end(b"partial head"), None);
    }

    #[tokio::test]
    async fn test_start_twice_is_already_running() {
        let app = test_app();
        app.start().await.unwrap();
        assert!(app.is_running().await);

        let err = app.start().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning));

        app.stop().await;
    }

    #[tokio::test]
    async fn test_stop_twice_is_a_noop() {
        let app = test_app();
        app.start().await.unwrap();
        app.stop().await;
        assert!(!app.is_running().await);
        app.stop().await;
        assert!(!app.is_running().await);
    }

    #[tokio::test]
    async fn test_restart_begins_from_empty_state() {
        let app = test_app();
        app.start().await.unwrap();
        app.set_method_hook(Method::Get, Some(crate::hook::hook(|_req: Request| async {
            Ok(HookOutcome::NotHandled)
        })))
        .unwrap();
        app.stop().await;

        app.start().await.unwrap();
        assert!(app.inner.hooks.is_empty());
        #[cfg(feature = "websocket")]
        assert_eq!(app.connection_count(), 0);
        app.stop().await;
    }

    #[tokio::test]
    async fn test_local_addr_only_while_running() {
        let app = test_app();
        assert!(app.local_addr().await.is_none());
        app.start().await.unwrap();
        let addr = app.local_addr().await.unwrap();
        assert_ne!(addr.port(), 0);
        app.stop().await;
        assert!(app.local_addr().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_method_registration_is_rejected() {
        let app = test_app();
        let err = app.set_method_hook("BREW", None).unwrap_err();
        assert!(matches!(err, Error::InvalidMethod(_)));
    }
}
