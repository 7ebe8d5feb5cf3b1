use super::{Handler, Next};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Serves files from a public directory.
///
/// Only GET and HEAD are answered; anything not found on disk passes on.
/// Directories serve their `index.html`.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    files: ServeDir,
}

impl StaticFiles {
    /// Serve files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            files: ServeDir::new(root.into()),
        }
    }
}

#[async_trait]
impl Handler for StaticFiles {
    fn name(&self) -> &'static str {
        "static-files"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return next.run(req).await;
        }

        // The file service consumes its request; keep the original for fall-through
        let mut lookup = Request::new(Body::empty());
        *lookup.method_mut() = req.method().clone();
        *lookup.uri_mut() = req.uri().clone();
        *lookup.headers_mut() = req.headers().clone();

        match self.files.clone().oneshot(lookup).await {
            Ok(response) if response.status() != StatusCode::NOT_FOUND => {
                response.map(Body::new).into_response()
            }
            Ok(_) => next.run(req).await,
            Err(never) => match never {},
        }
    }
}
