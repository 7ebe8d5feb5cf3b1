use super::{Handler, Next};
use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;
use std::time::Instant;

/// Logs every request answered by the handlers after it.
#[derive(Debug, Clone, Copy)]
pub struct RequestLogger;

#[async_trait]
impl Handler for RequestLogger {
    fn name(&self) -> &'static str {
        "logger"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = next.run(req).await;

        tracing::info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request"
        );
        response
    }
}
