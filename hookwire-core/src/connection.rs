//! Websocket connection tracking and the outbound send operation.
//!
//! The [`ConnectionTable`] is the sole owner of per-connection state. An
//! entry is inserted the moment an upgrade handshake completes and removed
//! the moment the transport reports the connection closed, a send fails, the
//! slot table evicts it, or the server stops. There is no grace period:
//! closure is instantaneous from the table's perspective, and a closed
//! identifier is never reinserted.
//!
//! Identifiers are handed out from a table-local counter and never reused, so
//! a stale identifier from a long-gone connection simply misses the table and
//! gets [`Error::NotConnected`] instead of addressing a stranger.
//!
//! # Architecture
//!
//! Each connection's write half lives in its table entry behind an async
//! mutex; [`ConnectionTable::send`] locks it, writes exactly one frame, and
//! releases it. The read half stays with the per-connection task spawned by
//! the accept path ([`drive_connection`]), which answers pings, surfaces data
//! frames to the message hook, and tears the entry down on close or error.

use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::ConnectionId;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// The write half of an upgraded connection.
pub(crate) type WsWriter = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// Invoked once per completed upgrade with the new connection's identifier.
///
/// Runs synchronously on the accepting task, before any data frame from that
/// client is processed, so it must stay brief; heavy work should hand off
/// with `tokio::spawn`.
pub type ConnectHook = Arc<dyn Fn(ConnectionId) + Send + Sync>;

/// Invoked for each inbound data frame with the sender's identifier.
pub type MessageHook = Arc<dyn Fn(ConnectionId, Payload) + Send + Sync>;

struct ConnectionEntry {
    writer: Arc<Mutex<WsWriter>>,
    opened_at: Instant,
    /// Logical timestamp for LRU eviction, bumped on every frame in or out.
    last_seen: AtomicU64,
}

/// Tracks every open websocket connection and addresses outbound pushes.
///
/// All operations are safe to call from any task. Insert/remove race freely
/// with sends; a send that loses the race gets [`Error::NotConnected`].
pub struct ConnectionTable {
    entries: DashMap<ConnectionId, ConnectionEntry>,
    next_id: AtomicU64,
    clock: AtomicU64,
    max_frame_size: usize,
}

impl ConnectionTable {
    /// Creates an empty table with the given outbound frame size limit.
    pub(crate) fn new(max_frame_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            clock: AtomicU64::new(0),
            max_frame_size,
        }
    }

    /// Registers a freshly upgraded connection and assigns its identifier.
    pub(crate) fn insert(&self, writer: WsWriter) -> (ConnectionId, Arc<Mutex<WsWriter>>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let writer = Arc::new(Mutex::new(writer));
        let entry = ConnectionEntry {
            writer: writer.clone(),
            opened_at: Instant::now(),
            last_seen: AtomicU64::new(self.clock.fetch_add(1, Ordering::SeqCst)),
        };
        self.entries.insert(id, entry);
        info!("connection {} added (total: {})", id, self.entries.len());
        (id, writer)
    }

    /// Drops the entry for `id`. Returns the writer when the entry was still
    /// present, so the caller can close the socket politely.
    pub(crate) fn remove(&self, id: ConnectionId) -> Option<Arc<Mutex<WsWriter>>> {
        let removed = self.entries.remove(&id).map(|(_, e)| e.writer);
        if removed.is_some() {
            info!("connection {} removed (total: {})", id, self.entries.len());
        }
        removed
    }

    /// Bumps the LRU timestamp for `id`.
    pub(crate) fn touch(&self, id: ConnectionId) {
        if let Some(entry) = self.entries.get(&id) {
            entry
                .last_seen
                .store(self.clock.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
        }
    }

    /// Whether `id` currently addresses an open connection.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// The number of open connections.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// The identifiers of all open connections, in no particular order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.entries.iter().map(|e| *e.key()).collect()
    }

    /// When the connection was opened, if it is still open.
    pub fn opened_at(&self, id: ConnectionId) -> Option<Instant> {
        self.entries.get(&id).map(|e| e.opened_at)
    }

    /// The least-recently-seen connection, the eviction candidate when the
    /// slot table is full.
    pub(crate) fn least_recently_seen(&self) -> Option<ConnectionId> {
        self.entries
            .iter()
            .min_by_key(|e| e.last_seen.load(Ordering::SeqCst))
            .map(|e| *e.key())
    }

    /// Evicts the least-recently-seen connection to admit a new one.
    pub(crate) async fn evict_lru(&self) -> Option<ConnectionId> {
        let victim = self.least_recently_seen()?;
        if let Some(writer) = self.remove(victim) {
            let mut w = writer.lock().await;
            let _ = w.send(WsMessage::Close(None)).await;
            let _ = w.close().await;
            warn!("connection {} purged to admit a new client", victim);
        }
        Some(victim)
    }

    /// Attempts to deliver one websocket frame to one specific connection.
    ///
    /// At most one frame is written per call, and the payload is not retained
    /// past it. On any failure the entry is removed from the table *before*
    /// the error returns, so retrying the same identifier deterministically
    /// yields [`Error::NotConnected`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] when `id` does not address an open
    ///   connection. Nothing is written anywhere.
    /// - [`Error::Transport`] when the payload exceeds the frame size limit
    ///   (nothing touches the wire) or when the wire write fails. Either way
    ///   the connection is dead afterwards.
    pub async fn send(&self, id: ConnectionId, payload: Payload) -> Result<()> {
        let writer = self
            .entries
            .get(&id)
            .map(|e| e.writer.clone())
            .ok_or(Error::NotConnected(id))?;

        if payload.len() > self.max_frame_size {
            self.remove(id);
            let mut w = writer.lock().await;
            let _ = w.close().await;
            return Err(Error::transport(format!(
                "payload of {} bytes exceeds frame limit of {}",
                payload.len(),
                self.max_frame_size
            )));
        }

        let mut w = writer.lock().await;
        match w.send(payload.into_ws_message()).await {
            Ok(()) => {
                drop(w);
                self.touch(id);
                debug!("frame sent to connection {}", id);
                Ok(())
            }
            Err(e) => {
                drop(w);
                self.remove(id);
                warn!("send to connection {} failed: {}", id, e);
                Err(Error::transport(e.to_string()))
            }
        }
    }

    /// Raw-byte flavor of [`ConnectionTable::send`], taking the payload as
    /// bytes plus a text/binary flag.
    pub async fn send_raw(
        &self,
        id: ConnectionId,
        data: impl Into<bytes::Bytes>,
        is_text: bool,
    ) -> Result<()> {
        self.send(id, Payload::raw(data, is_text)).await
    }

    /// Closes every tracked connection and empties the table.
    pub(crate) async fn close_all(&self) {
        let writers: Vec<(ConnectionId, Arc<Mutex<WsWriter>>)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.writer.clone()))
            .collect();

        for (id, writer) in writers {
            self.entries.remove(&id);
            let mut w = writer.lock().await;
            let _ = w.send(WsMessage::Close(None)).await;
            let _ = w.close().await;
            debug!("connection {} closed on shutdown", id);
        }
    }
}

/// Runs one upgraded connection until it closes.
///
/// Inserts the table entry, invokes the connect hook exactly once before any
/// data frame is read, then pumps inbound frames: pings get pongs, data
/// frames bump the LRU clock and reach the message hook, close frames and
/// errors end the loop. On exit the entry is removed if a failed send or an
/// eviction has not removed it already.
pub(crate) async fn drive_connection(
    ws: WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
    table: Arc<ConnectionTable>,
    connect_hook: Option<ConnectHook>,
    message_hook: Option<MessageHook>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (writer_half, mut reader) = ws.split();
    let (id, writer) = table.insert(writer_half);
    info!("websocket connection {} established from {}", id, peer_addr);

    if let Some(hook) = connect_hook {
        hook(id);
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("connection {} stopping on shutdown signal", id);
                break;
            }
            frame = reader.next() => {
                let Some(frame) = frame else { break };
                match frame {
                    Ok(WsMessage::Close(_)) => {
                        info!("close frame received from connection {}", id);
                        break;
                    }
                    Ok(WsMessage::Ping(data)) => {
                        let mut w = writer.lock().await;
                        if w.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Pong(_)) => {}
                    Ok(msg) => {
                        if !table.contains(id) {
                            // Evicted or failed-send removal; the id is dead.
                            break;
                        }
                        table.touch(id);
                        if let Some(hook) = &message_hook {
                            if let Some(payload) = Payload::from_ws_message(msg) {
                                hook(id, payload);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("websocket error on connection {}: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    if table.remove(id).is_some() {
        let mut w = writer.lock().await;
        let _ = w.send(WsMessage::Close(None)).await;
        let _ = w.close().await;
    }
    info!("websocket connection {} closed", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::Role;

    /// Builds a real upgraded socket pair: the server's split sink goes into
    /// the table, the client end reads frames off the wire.
    async fn ws_pair() -> (WsWriter, WebSocketStream<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, server) = tokio::join!(TcpStream::connect(addr), async {
            listener.accept().await.unwrap().0
        });
        let server_ws =
            WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        let client_ws =
            WebSocketStream::from_raw_socket(client.unwrap(), Role::Client, None).await;
        let (writer, _reader) = server_ws.split();
        (writer, client_ws)
    }

    #[tokio::test]
    async fn test_send_to_unknown_id_is_not_connected() {
        let table = ConnectionTable::new(1024);
        let err = table.send(999, Payload::text("ping")).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected(999)));
    }

    #[tokio::test]
    async fn test_insert_send_and_receive() {
        let table = ConnectionTable::new(1024);
        let (writer, mut client) = ws_pair().await;
        let (id, _) = table.insert(writer);

        assert!(table.contains(id));
        assert_eq!(table.count(), 1);
        assert!(table.opened_at(id).is_some());

        table.send(id, Payload::text("ping")).await.unwrap();
        let frame = client.next().await.unwrap().unwrap();
        assert_eq!(frame, WsMessage::Text("ping".to_string()));
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let table = ConnectionTable::new(1024);
        let (w1, _c1) = ws_pair().await;
        let (first, _) = table.insert(w1);
        table.remove(first);

        let (w2, _c2) = ws_pair().await;
        let (second, _) = table.insert(w2);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_oversize_payload_kills_connection() {
        let table = ConnectionTable::new(8);
        let (writer, _client) = ws_pair().await;
        let (id, _) = table.insert(writer);

        let err = table
            .send(id, Payload::binary(vec![0u8; 64]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!table.contains(id));

        let err = table.send(id, Payload::text("x")).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_failed_send_removes_entry() {
        let table = ConnectionTable::new(1024);
        let (writer, client) = ws_pair().await;
        let (id, _) = table.insert(writer);
        drop(client);

        // The first few writes may land in socket buffers; keep sending
        // until the transport reports the peer gone.
        let mut failed = false;
        for _ in 0..100 {
            match table.send(id, Payload::text("ping")).await {
                Ok(()) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
                Err(Error::Transport(_)) | Err(Error::WebSocket(_)) => {
                    failed = true;
                    break;
                }
                Err(Error::NotConnected(_)) => {
                    failed = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(failed, "send never observed the dead peer");
        assert!(!table.contains(id));
        let err = table.send(id, Payload::text("ping")).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_lru_points_at_stale_connection() {
        let table = ConnectionTable::new(1024);
        let (w1, _c1) = ws_pair().await;
        let (w2, _c2) = ws_pair().await;
        let (id1, _) = table.insert(w1);
        let (id2, _) = table.insert(w2);

        // id1 was inserted first, so it starts as the LRU candidate.
        assert_eq!(table.least_recently_seen(), Some(id1));

        // Touching id1 makes id2 the stale one.
        table.touch(id1);
        assert_eq!(table.least_recently_seen(), Some(id2));
    }

    #[tokio::test]
    async fn test_evict_lru_removes_and_reports_victim() {
        let table = ConnectionTable::new(1024);
        let (w1, _c1) = ws_pair().await;
        let (id1, _) = table.insert(w1);

        let victim = table.evict_lru().await;
        assert_eq!(victim, Some(id1));
        assert_eq!(table.count(), 0);
        assert_eq!(table.evict_lru().await, None);
    }

    #[tokio::test]
    async fn test_close_all_empties_table() {
        let table = ConnectionTable::new(1024);
        let (w1, _c1) = ws_pair().await;
        let (w2, _c2) = ws_pair().await;
        let (id1, _) = table.insert(w1);
        let (id2, _) = table.insert(w2);

        table.close_all().await;
        assert_eq!(table.count(), 0);
        assert!(!table.contains(id1));
        assert!(!table.contains(id2));
    }

    #[tokio::test]
    async fn test_send_raw_text_flag() {
        let table = ConnectionTable::new(1024);
        let (writer, mut client) = ws_pair().await;
        let (id, _) = table.insert(writer);

        table.send_raw(id, &b"hello"[..], true).await.unwrap();
        let frame = client.next().await.unwrap().unwrap();
        assert!(matches!(frame, WsMessage::Text(t) if t == "hello"));

        table.send_raw(id, &b"\x01\x02"[..], false).await.unwrap();
        let frame = client.next().await.unwrap().unwrap();
        assert!(matches!(frame, WsMessage::Binary(b) if b == vec![1, 2]));
    }
}
