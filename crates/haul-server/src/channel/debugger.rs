//! Debugger relay channel.
//!
//! One rendezvous point for at most one debugger frontend and any number of
//! application runtimes:
//!
//! - a frame from the debugger goes to every runtime peer
//! - a frame from a runtime peer goes to the debugger only, or is dropped
//!   when no debugger is attached (never queued)
//!
//! When a second debugger attaches, the most recent one wins: the incumbent
//! is closed with a policy-violation close frame.

use super::{ChannelKind, Connection, ConnectionId, Disconnect, Frame, IdAllocator};
use axum::extract::ws::{close_code, WebSocket};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Close reason sent to an evicted debugger.
pub const EVICTED_REASON: &str = "Another debugger connected";

/// Role a connection declares when it upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The debugger frontend
    Debugger,
    /// An application runtime
    #[default]
    Client,
}

/// Recipients of one relayed frame.
enum Route {
    Runtimes(Vec<Connection>),
    Debugger(Connection),
    Drop,
    Ignore,
}

#[derive(Debug, Default)]
struct Peers {
    debugger: Option<Connection>,
    runtimes: HashMap<ConnectionId, Connection>,
}

/// Bidirectional relay between one debugger and many runtimes.
#[derive(Debug, Default)]
pub struct DebuggerChannel {
    peers: RwLock<Peers>,
    ids: IdAllocator,
    dropped: AtomicU64,
}

impl DebuggerChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection in the given role.
    ///
    /// Returns the connection id and the receiver the socket task drains.
    pub fn attach(&self, role: Role) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let id = self.ids.next();
        let (connection, rx) = Connection::open(id, ChannelKind::Debugger);

        let mut peers = self.peers.write();
        match role {
            Role::Debugger => {
                if let Some(previous) = peers.debugger.replace(connection) {
                    tracing::info!(
                        evicted = previous.id,
                        connection = id,
                        "debugger replaced by a newer connection"
                    );
                    previous.deliver(Frame::Close {
                        code: close_code::POLICY,
                        reason: EVICTED_REASON.to_string(),
                    });
                } else {
                    tracing::info!(connection = id, "debugger attached");
                }
            }
            Role::Client => {
                tracing::debug!(connection = id, "runtime attached");
                peers.runtimes.insert(id, connection);
            }
        }

        (id, rx)
    }

    /// Remove a connection.
    ///
    /// Detaching a debugger that was already evicted leaves the current
    /// debugger in place.
    pub fn detach(&self, id: ConnectionId) {
        let mut peers = self.peers.write();

        if peers.runtimes.remove(&id).is_some() {
            tracing::debug!(connection = id, "runtime detached");
            return;
        }

        if peers.debugger.as_ref().is_some_and(|d| d.id == id) {
            peers.debugger = None;
            tracing::info!(connection = id, "debugger detached");
        }
    }

    /// Route a frame received from connection `from`.
    pub fn relay(&self, from: ConnectionId, frame: Frame) {
        match self.route(from) {
            Route::Runtimes(runtimes) => self.broadcast_to_runtimes(&runtimes, frame),
            Route::Debugger(debugger) => {
                if !debugger.deliver(frame) {
                    self.detach(debugger.id);
                }
            }
            Route::Drop => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(connection = from, "no debugger attached, dropping frame");
            }
            Route::Ignore => {
                tracing::trace!(connection = from, "ignoring frame from detached connection");
            }
        }
    }

    /// Snapshot the recipients for a frame from `from`.
    fn route(&self, from: ConnectionId) -> Route {
        let peers = self.peers.read();

        if peers.debugger.as_ref().is_some_and(|d| d.id == from) {
            return Route::Runtimes(peers.runtimes.values().cloned().collect());
        }

        if !peers.runtimes.contains_key(&from) {
            return Route::Ignore;
        }

        match &peers.debugger {
            Some(debugger) => Route::Debugger(debugger.clone()),
            None => Route::Drop,
        }
    }

    fn broadcast_to_runtimes(&self, runtimes: &[Connection], frame: Frame) {
        let failed: Vec<ConnectionId> = runtimes
            .iter()
            .filter(|runtime| !runtime.deliver(frame.clone()))
            .map(|runtime| runtime.id)
            .collect();

        for id in failed {
            self.detach(id);
        }
    }

    /// Check if a debugger is currently attached.
    pub fn is_debugger_connected(&self) -> bool {
        self.peers
            .read()
            .debugger
            .as_ref()
            .is_some_and(Connection::is_alive)
    }

    /// Number of attached runtime peers.
    pub fn runtime_count(&self) -> usize {
        self.peers.read().runtimes.len()
    }

    /// Runtime frames dropped because no debugger was attached.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Serve an upgraded socket until it closes.
    pub(crate) async fn serve_socket(
        self: Arc<Self>,
        socket: WebSocket,
        role: Role,
        shutdown: watch::Receiver<bool>,
    ) {
        let (id, outbox) = self.attach(role);

        let relay = Arc::clone(&self);
        let reason = super::pump(socket, outbox, shutdown, move |frame| relay.relay(id, frame)).await;

        if reason == Disconnect::Failed {
            tracing::warn!(connection = id, ?role, "debugger channel connection failed");
        }
        self.detach(id);
    }
}
