//! Websocket payloads for outbound pushes and inbound data frames.
//!
//! A [`Payload`] is immutable once constructed: a byte sequence plus a
//! text/binary kind. Ownership moves into the send operation, which writes at
//! most one frame and retains nothing past the call.

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Whether a payload travels as a text or a binary frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// UTF-8 text frame.
    Text,
    /// Opaque binary frame.
    Binary,
}

/// One websocket message payload.
///
/// # Examples
///
/// ```
/// use hookwire_core::{Payload, PayloadKind};
///
/// let p = Payload::text("ping");
/// assert_eq!(p.kind(), PayloadKind::Text);
/// assert_eq!(p.as_text(), Some("ping"));
///
/// let b = Payload::binary(vec![0x01, 0x02]);
/// assert_eq!(b.kind(), PayloadKind::Binary);
/// assert_eq!(b.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Payload {
    data: Bytes,
    kind: PayloadKind,
}

impl Payload {
    /// Creates a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(text.into().into_bytes()),
            kind: PayloadKind::Text,
        }
    }

    /// Creates a binary payload.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            kind: PayloadKind::Binary,
        }
    }

    /// Creates a payload from raw bytes and an explicit kind flag, mirroring
    /// the `(data, is_text)` shape of the raw send surface.
    pub fn raw(data: impl Into<Bytes>, is_text: bool) -> Self {
        Self {
            data: data.into(),
            kind: if is_text {
                PayloadKind::Text
            } else {
                PayloadKind::Binary
            },
        }
    }

    /// The payload kind.
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// The payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The payload as text, when it is a valid UTF-8 text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            PayloadKind::Text => std::str::from_utf8(&self.data).ok(),
            PayloadKind::Binary => None,
        }
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn into_ws_message(self) -> WsMessage {
        match self.kind {
            PayloadKind::Text => {
                WsMessage::Text(String::from_utf8_lossy(&self.data).into_owned())
            }
            PayloadKind::Binary => WsMessage::Binary(self.data.to_vec()),
        }
    }

    /// Converts an inbound frame into a payload. Control frames (ping, pong,
    /// close) carry no payload at this layer and yield `None`.
    pub(crate) fn from_ws_message(msg: WsMessage) -> Option<Self> {
        match msg {
            WsMessage::Text(text) => Some(Self::text(text)),
            WsMessage::Binary(data) => Some(Self::binary(data)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_payload() {
        let p = Payload::text("hello");
        assert_eq!(p.kind(), PayloadKind::Text);
        assert_eq!(p.as_text(), Some("hello"));
        assert_eq!(p.as_bytes(), b"hello");
    }

    #[test]
    fn test_binary_payload_has_no_text_view() {
        let p = Payload::binary(vec![1, 2, 3]);
        assert_eq!(p.kind(), PayloadKind::Binary);
        assert!(p.as_text().is_none());
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn test_raw_kind_flag() {
        assert_eq!(Payload::raw(&b"x"[..], true).kind(), PayloadKind::Text);
        assert_eq!(Payload::raw(&b"x"[..], false).kind(), PayloadKind::Binary);
    }

    #[test]
    fn test_ws_message_round_trip() {
        let p = Payload::text("frame");
        let back = Payload::from_ws_message(p.clone().into_ws_message()).unwrap();
        assert_eq!(back.as_text(), Some("frame"));
    }

    #[test]
    fn test_control_frames_yield_none() {
        assert!(Payload::from_ws_message(WsMessage::Ping(vec![])).is_none());
        assert!(Payload::from_ws_message(WsMessage::Pong(vec![])).is_none());
        assert!(Payload::from_ws_message(WsMessage::Close(None)).is_none());
    }
}
