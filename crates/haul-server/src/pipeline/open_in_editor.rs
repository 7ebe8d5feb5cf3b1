use super::{text, Handler, Launcher, Next, RawBody};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Stack frame posted by the runtime's error screen.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackFrame {
    file: PathBuf,
    line_number: Option<u32>,
}

/// Opens a stack frame's file in the editor on `POST /open-stack-frame`.
pub struct OpenInEditor {
    launcher: Arc<dyn Launcher>,
}

impl OpenInEditor {
    /// Open frames through `launcher`.
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl Handler for OpenInEditor {
    fn name(&self) -> &'static str {
        "open-in-editor"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.method() != Method::POST || req.uri().path() != "/open-stack-frame" {
            return next.run(req).await;
        }

        let body = req.extensions().get::<RawBody>().cloned().unwrap_or_default();
        let frame: StackFrame = match serde_json::from_slice(&body.0) {
            Ok(frame) => frame,
            Err(e) => {
                return text(StatusCode::BAD_REQUEST, format!("Invalid stack frame: {}", e));
            }
        };

        match self.launcher.open_in_editor(&frame.file, frame.line_number) {
            Ok(()) => {
                tracing::info!(file = %frame.file.display(), line = ?frame.line_number, "opened in editor");
                text(StatusCode::OK, "OK")
            }
            Err(e) => {
                tracing::warn!("failed to open {} in editor: {}", frame.file.display(), e);
                text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to open editor: {}", e),
                )
            }
        }
    }
}
