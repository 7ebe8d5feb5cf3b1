use super::{Handler, Next};
use crate::bundle::SharedBundle;
use crate::tracker::CompileTracker;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Serves the compiler's in-memory output.
///
/// While a build is in progress requests wait for it to settle, so a client
/// never receives a half-written bundle.
pub struct BundleServer {
    tracker: Arc<CompileTracker>,
    bundle: SharedBundle,
}

impl BundleServer {
    /// Serve `bundle`, holding requests while `tracker` reports a build.
    pub fn new(tracker: Arc<CompileTracker>, bundle: SharedBundle) -> Self {
        Self { tracker, bundle }
    }
}

#[async_trait]
impl Handler for BundleServer {
    fn name(&self) -> &'static str {
        "bundle"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return next.run(req).await;
        }

        if self.tracker.status().is_compiling() {
            tracing::debug!(path = %req.uri().path(), "waiting for build to finish");
            self.tracker.wait_until_settled().await;
        }

        let file = self.bundle.read().get(req.uri().path()).cloned();
        match file {
            Some(file) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, file.content_type),
                    (header::CACHE_CONTROL, "no-cache".to_string()),
                ],
                file.content,
            )
                .into_response(),
            None => next.run(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Pipeline;
    use super::*;
    use crate::stats::StatsSnapshot;
    use std::time::Duration;

    fn bundle_with(path: &str, content: &'static str) -> SharedBundle {
        let bundle = SharedBundle::default();
        bundle.write().insert(path, content);
        bundle
    }

    #[tokio::test]
    async fn test_serves_cached_file() {
        let tracker = Arc::new(CompileTracker::default());
        let bundle = bundle_with("/index.bundle", "__d(0)");
        let pipeline = Pipeline::default().with(BundleServer::new(tracker, bundle));

        let response = pipeline.handle(get("/index.bundle")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript"
        );
        assert_eq!(body_string(response).await, "__d(0)");
    }

    #[tokio::test]
    async fn test_waits_while_compiling() {
        let tracker = Arc::new(CompileTracker::default());
        let bundle = bundle_with("/index.bundle", "old");
        let pipeline = Pipeline::default().with(BundleServer::new(
            Arc::clone(&tracker),
            Arc::clone(&bundle),
        ));

        tracker.on_build_start();
        let request = tokio::spawn(async move { pipeline.handle(get("/index.bundle")).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!request.is_finished());

        bundle.write().insert("/index.bundle", "new");
        tracker.on_build_done(Arc::new(StatsSnapshot::default()));

        let response = tokio::time::timeout(Duration::from_secs(2), request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body_string(response).await, "new");
    }

    #[tokio::test]
    async fn test_unknown_path_passes_on() {
        let pipeline = Pipeline::default().with(BundleServer::new(
            Arc::new(CompileTracker::default()),
            SharedBundle::default(),
        ));
        let response = pipeline.handle(get("/other.bundle")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
