use super::{text, Handler, Next};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::Response;

/// Largest request body buffered by [`RawBodyCapture`].
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// The complete request body, available to later handlers as an extension.
#[derive(Debug, Clone, Default)]
pub struct RawBody(pub Bytes);

impl RawBody {
    /// Body as UTF-8 text, lossily.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

/// Buffers the request body and stores it as a [`RawBody`] extension.
///
/// The body is restored on the request so it can be read again.
#[derive(Debug, Clone)]
pub struct RawBodyCapture {
    limit: usize,
}

impl RawBodyCapture {
    /// Buffer bodies up to `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    fn declared_length(req: &Request) -> Option<usize> {
        req.headers()
            .get(header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}

#[async_trait]
impl Handler for RawBodyCapture {
    fn name(&self) -> &'static str {
        "raw-body"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if Self::declared_length(&req).is_some_and(|length| length > self.limit) {
            return text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }

        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, self.limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("failed to read request body: {}", e);
                return text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
        };

        let mut req = Request::from_parts(parts, Body::from(bytes.clone()));
        req.extensions_mut().insert(RawBody(bytes));
        next.run(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Pipeline;
    use super::*;

    /// Echoes the captured body.
    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn handle(&self, req: Request, _next: Next<'_>) -> Response {
            let captured = req
                .extensions()
                .get::<RawBody>()
                .map(|raw| raw.as_text().into_owned())
                .unwrap_or_default();
            let restored = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .unwrap_or_default();
            text(
                StatusCode::OK,
                format!("{}|{}", captured, String::from_utf8_lossy(&restored)),
            )
        }
    }

    #[tokio::test]
    async fn test_body_captured_and_restored() {
        let pipeline = Pipeline::default()
            .with(RawBodyCapture::new(MAX_BODY_SIZE))
            .with(Echo);

        let response = pipeline.handle(post("/systrace", "trace data")).await;
        assert_eq!(body_string(response).await, "trace data|trace data");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let pipeline = Pipeline::default().with(RawBodyCapture::new(4)).with(Echo);

        let response = pipeline.handle(post("/systrace", "too long")).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let pipeline = Pipeline::default()
            .with(RawBodyCapture::new(MAX_BODY_SIZE))
            .with(Echo);

        let response = pipeline.handle(get("/status")).await;
        assert_eq!(body_string(response).await, "|");
    }
}
