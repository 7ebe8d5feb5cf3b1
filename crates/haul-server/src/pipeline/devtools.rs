use super::{text, Handler, Launcher, Next};
use crate::channel::DebuggerChannel;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::Response;
use std::sync::Arc;

/// Opens the debugger UI in a browser on `/launch-js-devtools`.
///
/// Nothing is opened when a debugger is already attached.
pub struct DevToolsLauncher {
    debugger: Arc<DebuggerChannel>,
    launcher: Arc<dyn Launcher>,
}

impl DevToolsLauncher {
    /// Launch through `launcher` unless `debugger` already has a frontend.
    pub fn new(debugger: Arc<DebuggerChannel>, launcher: Arc<dyn Launcher>) -> Self {
        Self { debugger, launcher }
    }
}

#[async_trait]
impl Handler for DevToolsLauncher {
    fn name(&self) -> &'static str {
        "devtools"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.uri().path() != "/launch-js-devtools" {
            return next.run(req).await;
        }

        if self.debugger.is_debugger_connected() {
            tracing::debug!("debugger already attached, not launching another");
            return text(StatusCode::OK, "OK");
        }

        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
            .unwrap_or("localhost:8081");
        let url = format!("http://{}/debugger-ui", host);

        match self.launcher.open_url(&url) {
            Ok(()) => tracing::info!(url = %url, "launched debugger UI"),
            Err(e) => tracing::warn!("failed to launch debugger UI at {}: {}", url, e),
        }

        text(StatusCode::OK, "OK")
    }
}
