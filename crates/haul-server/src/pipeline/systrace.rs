use super::{text, Handler, Next, RawBody};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes posted systrace dumps to disk on `POST /systrace`.
#[derive(Debug, Clone)]
pub struct Systrace {
    dir: PathBuf,
}

impl Systrace {
    /// Write dumps into `dir`, creating it on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn write_dump(&self, body: &RawBody) -> std::io::Result<PathBuf> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let path = self.dir.join(format!("dump_{}.json", millis));

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, &body.0).await?;
        Ok(path)
    }
}

#[async_trait]
impl Handler for Systrace {
    fn name(&self) -> &'static str {
        "systrace"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.method() != Method::POST || req.uri().path() != "/systrace" {
            return next.run(req).await;
        }

        let body = req.extensions().get::<RawBody>().cloned().unwrap_or_default();
        match self.write_dump(&body).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "systrace dump written");
                text(
                    StatusCode::OK,
                    format!(
                        "Your trace was saved to: {}\n\n\
                         On the computer running the server, open chrome://tracing \
                         and load that file.",
                        path.display()
                    ),
                )
            }
            Err(e) => {
                tracing::error!("failed to write systrace dump: {}", e);
                text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to save trace: {}", e),
                )
            }
        }
    }
}
