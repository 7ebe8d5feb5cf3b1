use super::{Handler, Next};
use crate::tracker::CompileTracker;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Long-poll endpoint: `GET /onchange` answers 205 after the next build.
pub struct LiveReload {
    tracker: Arc<CompileTracker>,
}

impl LiveReload {
    /// Answer long-polls when `tracker` completes the next build.
    pub fn new(tracker: Arc<CompileTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Handler for LiveReload {
    fn name(&self) -> &'static str {
        "live-reload"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.method() != Method::GET || req.uri().path() != "/onchange" {
            return next.run(req).await;
        }

        let progress = self.tracker.wait_for_next_build().await;
        tracing::debug!(build = progress.completed_builds, "notifying live-reload watcher");
        StatusCode::RESET_CONTENT.into_response()
    }
}
