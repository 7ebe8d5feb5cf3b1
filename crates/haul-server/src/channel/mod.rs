//! WebSocket channels.
//!
//! Each channel owns its own connection set and routing rule. A connection is
//! represented on the channel side by an outbox (`mpsc::Sender<Frame>`); the
//! socket task drains the outbox into the WebSocket and feeds inbound frames
//! back to the channel. Channels therefore never touch sockets directly, and
//! never hold a lock across an `.await`.

pub mod debugger;
pub mod hmr;

pub use debugger::{DebuggerChannel, Role};
pub use hmr::{HmrChannel, HmrMessage, ModuleUpdate};

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};

/// Capacity of each connection's outbox.
///
/// A client that falls this far behind is treated as broken and dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// Identifier of one WebSocket connection, unique within a channel.
pub type ConnectionId = u64;

/// Which channel a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Debugger relay channel
    Debugger,
    /// Hot-update notification channel
    Hmr,
}

/// A frame travelling through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
    /// Close the connection with a code and reason
    Close {
        /// WebSocket close code
        code: u16,
        /// Human-readable reason
        reason: String,
    },
}

impl Frame {
    fn into_message(self) -> Message {
        match self {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes),
            Frame::Close { code, reason } => Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })),
        }
    }
}

/// Channel-side handle of one open socket.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Connection identifier
    pub id: ConnectionId,
    /// Owning channel
    pub channel: ChannelKind,
    outbox: mpsc::Sender<Frame>,
}

impl Connection {
    fn open(id: ConnectionId, channel: ChannelKind) -> (Self, mpsc::Receiver<Frame>) {
        let (outbox, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (
            Self {
                id,
                channel,
                outbox,
            },
            rx,
        )
    }

    /// False once the socket task has gone away.
    pub fn is_alive(&self) -> bool {
        !self.outbox.is_closed()
    }

    /// Queue a frame without waiting.
    ///
    /// A full or closed outbox is a delivery failure; the caller drops the
    /// connection.
    fn deliver(&self, frame: Frame) -> bool {
        match self.outbox.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection = self.id,
                    channel = ?self.channel,
                    "outbox full, dropping slow connection"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Monotonic connection id allocator.
#[derive(Debug, Default)]
struct IdAllocator(AtomicU64);

impl IdAllocator {
    fn next(&self) -> ConnectionId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Why a socket task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disconnect {
    /// Peer closed or the stream ended
    Remote,
    /// The channel asked for the connection to be closed
    Evicted,
    /// Reading or writing failed
    Failed,
    /// Server shutdown
    Shutdown,
}

/// Drive one socket until it closes.
///
/// Outbound frames come from `outbox`; inbound text and binary frames are
/// passed to `on_frame`. Ping/pong is answered by the transport.
pub(crate) async fn pump(
    mut socket: WebSocket,
    mut outbox: mpsc::Receiver<Frame>,
    mut shutdown: watch::Receiver<bool>,
    mut on_frame: impl FnMut(Frame) + Send,
) -> Disconnect {
    loop {
        tokio::select! {
            outbound = outbox.recv() => {
                let Some(frame) = outbound else {
                    // Channel dropped us without a close frame
                    return Disconnect::Evicted;
                };
                let closing = matches!(frame, Frame::Close { .. });
                if socket.send(frame.into_message()).await.is_err() {
                    return Disconnect::Failed;
                }
                if closing {
                    return Disconnect::Evicted;
                }
            }

            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => on_frame(Frame::Text(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => on_frame(Frame::Binary(bytes)),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Disconnect::Remote,
                Some(Err(e)) => {
                    tracing::warn!("dropping connection after protocol error: {}", e);
                    return Disconnect::Failed;
                }
            },

            _ = async { let _ = shutdown.wait_for(|stopping| *stopping).await; } => {
                let _ = socket
                    .send(Frame::Close {
                        code: close_code::AWAY,
                        reason: "Server shutting down".to_string(),
                    }.into_message())
                    .await;
                return Disconnect::Shutdown;
            }
        }
    }
}
