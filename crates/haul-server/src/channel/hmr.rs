//! Hot-update notification channel.
//!
//! Every connected client first receives the current build status, then a
//! `compiling` message whenever a rebuild starts and a `success` or `errors`
//! message whenever one finishes.

use super::{ChannelKind, Connection, ConnectionId, Frame, IdAllocator};
use crate::stats::StatsSnapshot;
use crate::tracker::{BuildStatus, CompileTracker};
use axum::extract::ws::WebSocket;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// A changed module in a `success` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUpdate {
    /// Module identifier
    pub id: String,
    /// New content hash
    pub hash: String,
}

/// Messages pushed to hot-update clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrMessage {
    /// Initial message on every new connection
    Status {
        /// Current build status
        status: BuildStatus,
        /// Hash of the last completed build, if any
        hash: Option<String>,
    },

    /// A rebuild started
    Compiling,

    /// A rebuild finished without errors or warnings
    Success {
        /// Build hash
        hash: String,
        /// Build duration in milliseconds
        time: u64,
        /// Modules whose content changed
        modules: Vec<ModuleUpdate>,
    },

    /// A rebuild finished with errors or warnings
    Errors {
        /// Build hash
        hash: String,
        /// Error descriptions
        errors: Vec<String>,
        /// Warning descriptions
        warnings: Vec<String>,
    },
}

impl HmrMessage {
    /// Build the completion message for a finished build.
    pub fn from_stats(stats: &StatsSnapshot, has_issues: bool) -> Self {
        if has_issues {
            HmrMessage::Errors {
                hash: stats.hash.clone(),
                errors: stats.errors.clone(),
                warnings: stats.warnings.clone(),
            }
        } else {
            HmrMessage::Success {
                hash: stats.hash.clone(),
                time: stats.time_ms,
                modules: stats
                    .changed_modules()
                    .map(|module| ModuleUpdate {
                        id: module.id.clone(),
                        hash: module.hash.clone(),
                    })
                    .collect(),
            }
        }
    }

    /// Initial message describing the tracker's current state.
    pub fn status_of(tracker: &CompileTracker) -> Self {
        HmrMessage::Status {
            status: tracker.status(),
            hash: tracker.last_stats().map(|stats| stats.hash.clone()),
        }
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Broadcast channel for hot-update clients.
#[derive(Debug)]
pub struct HmrChannel {
    tracker: Arc<CompileTracker>,
    clients: RwLock<HashMap<ConnectionId, Connection>>,
    ids: IdAllocator,
}

impl HmrChannel {
    /// Create a channel reporting the given tracker's status to new clients.
    pub fn new(tracker: Arc<CompileTracker>) -> Self {
        Self {
            tracker,
            clients: RwLock::new(HashMap::new()),
            ids: IdAllocator::default(),
        }
    }

    /// Register a new client.
    ///
    /// The status message is queued before the client becomes visible to
    /// broadcasts, so it is always the first frame the client sees.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let id = self.ids.next();
        let (connection, rx) = Connection::open(id, ChannelKind::Hmr);

        let mut clients = self.clients.write();
        let status = HmrMessage::status_of(&self.tracker);
        connection.deliver(Frame::Text(status.to_json()));
        clients.insert(id, connection);

        tracing::debug!(connection = id, "hot-update client connected");
        (id, rx)
    }

    /// Unregister a client.
    pub fn disconnect(&self, id: ConnectionId) {
        if self.clients.write().remove(&id).is_some() {
            tracing::debug!(connection = id, "hot-update client disconnected");
        }
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Delivery is best-effort per client: a client whose outbox is closed or
    /// full is removed and the others still receive the message. Returns the
    /// number of clients the message was queued for.
    pub fn broadcast(&self, message: &HmrMessage) -> usize {
        let json = message.to_json();

        // Send to a snapshot so a client disconnecting mid-broadcast is harmless
        let clients: Vec<Connection> = self.clients.read().values().cloned().collect();

        let mut failed_ids = Vec::new();
        let mut delivered = 0;
        for client in &clients {
            if client.deliver(Frame::Text(json.clone())) {
                delivered += 1;
            } else {
                failed_ids.push(client.id);
            }
        }

        for id in failed_ids {
            self.disconnect(id);
        }

        delivered
    }

    /// Get number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Serve an upgraded socket until it closes.
    pub(crate) async fn serve_socket(
        self: Arc<Self>,
        socket: WebSocket,
        shutdown: watch::Receiver<bool>,
    ) {
        let (id, outbox) = self.connect();

        // Clients have nothing to tell us
        super::pump(socket, outbox, shutdown, |_| {}).await;

        self.disconnect(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ModuleStat;

    fn recv_json(rx: &mut mpsc::Receiver<Frame>) -> serde_json::Value {
        match rx.try_recv() {
            Ok(Frame::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    fn stats_with_modules() -> StatsSnapshot {
        StatsSnapshot {
            hash: "abc123".to_string(),
            time_ms: 42,
            modules: vec![
                ModuleStat {
                    id: "/index.bundle".to_string(),
                    hash: "h1".to_string(),
                    changed: true,
                },
                ModuleStat {
                    id: "/vendor.js".to_string(),
                    hash: "h2".to_string(),
                    changed: false,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_wire_format_compiling() {
        insta::assert_snapshot!(HmrMessage::Compiling.to_json(), @r#"{"type":"compiling"}"#);
    }

    #[test]
    fn test_wire_format_success_lists_changed_modules() {
        let message = HmrMessage::from_stats(&stats_with_modules(), false);
        insta::assert_snapshot!(
            message.to_json(),
            @r#"{"type":"success","hash":"abc123","time":42,"modules":[{"id":"/index.bundle","hash":"h1"}]}"#
        );
    }

    #[test]
    fn test_wire_format_errors() {
        let stats = StatsSnapshot {
            hash: "def456".to_string(),
            errors: vec!["Module not found: ./missing".to_string()],
            ..Default::default()
        };
        let message = HmrMessage::from_stats(&stats, true);
        insta::assert_snapshot!(
            message.to_json(),
            @r#"{"type":"errors","hash":"def456","errors":["Module not found: ./missing"],"warnings":[]}"#
        );
    }

    #[test]
    fn test_new_client_receives_status_first() {
        let tracker = Arc::new(CompileTracker::default());
        let channel = HmrChannel::new(Arc::clone(&tracker));

        let (_id, mut rx) = channel.connect();
        let first = recv_json(&mut rx);
        assert_eq!(first["type"], "status");
        assert_eq!(first["status"], "idle");
        assert!(first["hash"].is_null());

        channel.broadcast(&HmrMessage::Compiling);
        assert_eq!(recv_json(&mut rx)["type"], "compiling");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_late_client_sees_current_status() {
        let tracker = Arc::new(CompileTracker::default());
        let channel = HmrChannel::new(Arc::clone(&tracker));

        tracker.on_build_start();
        tracker.on_build_done(Arc::new(StatsSnapshot {
            hash: "h".to_string(),
            warnings: vec!["deprecated API".to_string()],
            ..Default::default()
        }));

        let (_id, mut rx) = channel.connect();
        let first = recv_json(&mut rx);
        assert_eq!(first["status"], "succeeded-with-issues");
        assert_eq!(first["hash"], "h");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let channel = HmrChannel::new(Arc::new(CompileTracker::default()));
        let mut receivers: Vec<_> = (0..3).map(|_| channel.connect().1).collect();

        assert_eq!(channel.broadcast(&HmrMessage::Compiling), 3);

        for rx in receivers.iter_mut() {
            assert_eq!(recv_json(rx)["type"], "status");
            assert_eq!(recv_json(rx)["type"], "compiling");
        }
    }

    #[test]
    fn test_failed_client_removed_others_delivered() {
        let channel = HmrChannel::new(Arc::new(CompileTracker::default()));
        let (_gone, gone_rx) = channel.connect();
        let (_alive, mut alive_rx) = channel.connect();
        drop(gone_rx);

        assert_eq!(channel.broadcast(&HmrMessage::Compiling), 1);
        assert_eq!(channel.client_count(), 1);

        recv_json(&mut alive_rx);
        assert_eq!(recv_json(&mut alive_rx)["type"], "compiling");
    }

    #[test]
    fn test_disconnect_removes_client() {
        let channel = HmrChannel::new(Arc::new(CompileTracker::default()));
        let (id, _rx) = channel.connect();
        assert_eq!(channel.client_count(), 1);

        channel.disconnect(id);
        assert_eq!(channel.client_count(), 0);
        assert_eq!(channel.broadcast(&HmrMessage::Compiling), 0);
    }

    #[test]
    fn test_warnings_only_build_is_errors_message() {
        let stats = StatsSnapshot {
            warnings: vec!["large bundle".to_string()],
            ..Default::default()
        };
        match HmrMessage::from_stats(&stats, stats.has_issues()) {
            HmrMessage::Errors {
                errors, warnings, ..
            } => {
                assert!(errors.is_empty());
                assert_eq!(warnings, vec!["large bundle"]);
            }
            other => panic!("expected errors message, got {:?}", other),
        }
    }
}
