use super::{Handler, Next};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Answers bundle requests nothing else served.
///
/// The body is JavaScript that throws, so the runtime shows a readable error
/// instead of failing to parse an HTML 404 page.
#[derive(Debug, Clone, Copy)]
pub struct MissingBundle;

fn is_bundle_request(path: &str) -> bool {
    path.ends_with(".bundle") || path.ends_with(".js")
}

fn throwing_script(path: &str) -> String {
    let message = format!(
        "Could not load bundle '{}'. The compiler did not produce it: \
         check the entry name and platform in your haul config, \
         and make sure the last build succeeded.",
        path
    );
    let literal = serde_json::to_string(&message).unwrap_or_else(|_| "\"Bundle not found\"".into());
    format!("throw new Error({});\n", literal)
}

#[async_trait]
impl Handler for MissingBundle {
    fn name(&self) -> &'static str {
        "missing-bundle"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if !is_bundle_request(req.uri().path()) {
            return next.run(req).await;
        }

        let path = req.uri().path();
        tracing::warn!(path = %path, "requested bundle does not exist");
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/javascript")],
            throwing_script(path),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Pipeline;
    use super::*;

    #[tokio::test]
    async fn test_missing_bundle_throws() {
        let response = Pipeline::default()
            .with(MissingBundle)
            .handle(get("/index.android.bundle"))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript"
        );
        let body = body_string(response).await;
        assert!(body.starts_with("throw new Error(\"Could not load bundle '/index.android.bundle'"));
    }

    #[tokio::test]
    async fn test_other_paths_get_plain_404() {
        let response = Pipeline::default()
            .with(MissingBundle)
            .handle(get("/favicon.ico"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "Cannot GET /favicon.ico");
    }

    #[test]
    fn test_quotes_are_escaped() {
        let script = throwing_script("/a\"b.js");
        assert!(script.contains("'/a\\\"b.js'"));
    }
}
