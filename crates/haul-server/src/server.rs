//! Server shell.
//!
//! Binds one HTTP listener and routes every request:
//!
//! - WebSocket upgrades on the debugger path go to the [`DebuggerChannel`]
//! - WebSocket upgrades on the HMR path go to the [`HmrChannel`]
//! - other upgrade requests are rejected with 404
//! - everything else is dispatched to the [`Pipeline`]

use crate::channel::{DebuggerChannel, HmrChannel, HmrMessage, Role};
use crate::error::{Result, ServerError};
use crate::pipeline::Pipeline;
use crate::stats::StatsSnapshot;
use crate::tracker::{BuildCallbacks, CompileTracker};
use axum::{
    extract::{ws::WebSocketUpgrade, FromRequestParts, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

/// Listener address and channel paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind
    pub addr: SocketAddr,
    /// Upgrade path of the debugger channel
    pub debugger_path: String,
    /// Upgrade path of the hot-update channel
    pub hmr_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8081)),
            debugger_path: "/debugger-proxy".to_string(),
            hmr_path: "/hot".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the server URL.
    pub fn server_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Check that both channel paths are absolute and distinct.
    pub fn validate(&self) -> Result<()> {
        for path in [&self.debugger_path, &self.hmr_path] {
            if !path.starts_with('/') {
                return Err(ServerError::InvalidConfig(format!(
                    "channel path '{}' must start with '/'",
                    path
                )));
            }
        }

        if self.debugger_path == self.hmr_path {
            return Err(ServerError::InvalidConfig(format!(
                "debugger and hot-update channels both use '{}'",
                self.debugger_path
            )));
        }

        let nested = |outer: &str, inner: &str| {
            inner.starts_with(outer.trim_end_matches('/'))
                && inner[outer.trim_end_matches('/').len()..].starts_with('/')
        };
        if nested(&self.debugger_path, &self.hmr_path) || nested(&self.hmr_path, &self.debugger_path) {
            return Err(ServerError::InvalidConfig(format!(
                "channel paths '{}' and '{}' overlap",
                self.debugger_path, self.hmr_path
            )));
        }

        Ok(())
    }
}

/// Entry points the compiler collaborator calls.
///
/// Each event updates the tracker first, then notifies hot-update clients.
#[derive(Debug, Clone)]
pub struct BuildLifecycle {
    tracker: Arc<CompileTracker>,
    hmr: Arc<HmrChannel>,
}

impl BuildLifecycle {
    /// The first build started.
    pub fn on_build_start(&self) {
        self.tracker.on_build_start();
        self.hmr.broadcast(&HmrMessage::Compiling);
    }

    /// A source change invalidated the current build.
    pub fn on_build_invalid(&self) {
        self.tracker.on_build_invalid();
        self.hmr.broadcast(&HmrMessage::Compiling);
    }

    /// A build finished. Returns whether it had issues.
    pub fn on_build_done(&self, stats: StatsSnapshot) -> bool {
        let stats = Arc::new(stats);
        let has_issues = self.tracker.on_build_done(Arc::clone(&stats));

        let delivered = self
            .hmr
            .broadcast(&HmrMessage::from_stats(&stats, has_issues));
        tracing::debug!(hash = %stats.hash, has_issues, clients = delivered, "build result broadcast");

        has_issues
    }
}

/// Stops the listener and closes every open WebSocket.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Begin shutdown.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Check whether shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Development server core.
///
/// Owns the compile tracker and both channels. Create once, then
/// [`bind`](Self::bind) and [`serve`](BoundServer::serve).
#[derive(Debug)]
pub struct DevServer {
    config: ServerConfig,
    tracker: Arc<CompileTracker>,
    debugger: Arc<DebuggerChannel>,
    hmr: Arc<HmrChannel>,
    shutdown: ShutdownHandle,
}

impl DevServer {
    /// Create a server reporting build events to `callbacks`.
    pub fn new(config: ServerConfig, callbacks: BuildCallbacks) -> Self {
        let tracker = Arc::new(CompileTracker::new(callbacks));
        let hmr = Arc::new(HmrChannel::new(Arc::clone(&tracker)));

        Self {
            config,
            tracker,
            debugger: Arc::new(DebuggerChannel::new()),
            hmr,
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Listener address and channel paths.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle for the compiler collaborator.
    pub fn lifecycle(&self) -> BuildLifecycle {
        BuildLifecycle {
            tracker: Arc::clone(&self.tracker),
            hmr: Arc::clone(&self.hmr),
        }
    }

    /// The compile state tracker.
    pub fn tracker(&self) -> &Arc<CompileTracker> {
        &self.tracker
    }

    /// The debugger relay channel.
    pub fn debugger(&self) -> &Arc<DebuggerChannel> {
        &self.debugger
    }

    /// The hot-update channel.
    pub fn hmr(&self) -> &Arc<HmrChannel> {
        &self.hmr
    }

    /// Handle that stops the server and closes every socket.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound. Both are fatal; there is no fallback port.
    pub async fn bind(&self, pipeline: Pipeline) -> Result<BoundServer> {
        self.config.validate()?;

        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            addr = %local_addr,
            debugger = %self.config.debugger_path,
            hmr = %self.config.hmr_path,
            "listening"
        );

        Ok(BoundServer {
            listener,
            router: self.build_router(pipeline),
            local_addr,
            shutdown: self.shutdown.clone(),
        })
    }

    /// Bind and serve until shutdown.
    pub async fn start(&self, pipeline: Pipeline) -> Result<()> {
        self.bind(pipeline).await?.serve().await
    }

    fn build_router(&self, pipeline: Pipeline) -> Router {
        let state = AppState {
            debugger_path: Arc::from(self.config.debugger_path.as_str()),
            hmr_path: Arc::from(self.config.hmr_path.as_str()),
            debugger: Arc::clone(&self.debugger),
            hmr: Arc::clone(&self.hmr),
            pipeline: Arc::new(pipeline),
            shutdown: self.shutdown.subscribe(),
        };

        Router::new()
            .fallback(handle_request)
            .layer(
                // Debugger frontends are served from other origins
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(state)
    }
}

/// A bound listener, ready to serve.
#[derive(Debug)]
pub struct BoundServer {
    listener: tokio::net::TcpListener,
    router: Router,
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
}

impl BoundServer {
    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the shutdown handle fires.
    pub async fn serve(self) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stopping| *stopping).await;
                tracing::info!("shutting down");
            })
            .await
            .map_err(ServerError::Serve)
    }
}

#[derive(Clone)]
struct AppState {
    debugger_path: Arc<str>,
    hmr_path: Arc<str>,
    debugger: Arc<DebuggerChannel>,
    hmr: Arc<HmrChannel>,
    pipeline: Arc<Pipeline>,
    shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Deserialize)]
struct DebuggerQuery {
    role: Option<Role>,
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

async fn handle_request(State(state): State<AppState>, req: Request) -> Response {
    if is_websocket_upgrade(req.headers()) {
        return handle_upgrade(state, req).await;
    }

    let mut shutdown = state.shutdown.clone();
    tokio::select! {
        response = state.pipeline.handle(req) => response,
        // Long-polls would otherwise hold graceful shutdown open
        _ = async { let _ = shutdown.wait_for(|stopping| *stopping).await; } => {
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn handle_upgrade(state: AppState, req: Request) -> Response {
    let (mut parts, _body) = req.into_parts();
    let path = parts.uri.path().to_string();

    if path != *state.debugger_path && path != *state.hmr_path {
        tracing::debug!(path = %path, "rejecting upgrade to unknown path");
        return StatusCode::NOT_FOUND.into_response();
    }

    let role = if path == *state.debugger_path {
        match Query::<DebuggerQuery>::try_from_uri(&parts.uri) {
            Ok(Query(query)) => Some(query.role.unwrap_or_default()),
            Err(rejection) => return rejection.into_response(),
        }
    } else {
        None
    };

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let shutdown = state.shutdown.clone();
    match role {
        Some(role) => {
            let debugger = Arc::clone(&state.debugger);
            upgrade.on_upgrade(move |socket| debugger.serve_socket(socket, role, shutdown))
        }
        None => {
            let hmr = Arc::clone(&state.hmr);
            upgrade.on_upgrade(move |socket| hmr.serve_socket(socket, shutdown))
        }
    }
}
