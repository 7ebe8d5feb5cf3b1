use super::{text, Handler, Next};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;

/// Body of the `/status` answer, checked by runtimes before connecting.
pub const STATUS_RUNNING: &str = "packager-status:running";

/// Liveness probe on `/status`.
#[derive(Debug, Clone, Copy)]
pub struct StatusPage;

#[async_trait]
impl Handler for StatusPage {
    fn name(&self) -> &'static str {
        "status-page"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.uri().path() == "/status" {
            text(StatusCode::OK, STATUS_RUNNING)
        } else {
            next.run(req).await
        }
    }
}
