//! Request pipeline.
//!
//! Ordinary HTTP requests flow through an ordered list of [`Handler`]s. Each
//! handler either answers the request or passes it on with [`Next::run`]; a
//! request that falls off the end of the list gets a 404.
//!
//! ```text
//! request → static files → raw body → devtools → live reload → status
//!         → symbolicate → open in editor → systrace → logger → bundle
//!         → missing bundle → 404
//! ```

mod bundle_server;
mod devtools;
mod launcher;
mod live_reload;
mod logger;
mod missing_bundle;
mod open_in_editor;
mod raw_body;
mod static_files;
mod status_page;
mod symbolicate;
mod systrace;

pub use bundle_server::BundleServer;
pub use devtools::DevToolsLauncher;
pub use launcher::{Launcher, SystemLauncher};
pub use live_reload::LiveReload;
pub use logger::RequestLogger;
pub use missing_bundle::MissingBundle;
pub use open_in_editor::OpenInEditor;
pub use raw_body::{RawBody, RawBodyCapture, MAX_BODY_SIZE};
pub use static_files::StaticFiles;
pub use status_page::StatusPage;
pub use symbolicate::Symbolicate;
pub use systrace::Systrace;

use crate::bundle::SharedBundle;
use crate::channel::DebuggerChannel;
use crate::tracker::CompileTracker;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use std::sync::Arc;

/// One step of the request pipeline.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Answer the request, or hand it to the rest of the pipeline.
    async fn handle(&self, req: Request, next: Next<'_>) -> Response;
}

/// The handlers after the current one.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    handlers: &'a [Arc<dyn Handler>],
}

impl<'a> Next<'a> {
    /// Pass the request to the next handler, or answer 404 at the end.
    pub async fn run(self, req: Request) -> Response {
        match self.handlers.split_first() {
            Some((handler, rest)) => {
                tracing::trace!(handler = handler.name(), path = %req.uri().path(), "dispatch");
                handler.handle(req, Next { handlers: rest }).await
            }
            None => {
                let body = format!("Cannot {} {}", req.method(), req.uri().path());
                text(StatusCode::NOT_FOUND, body)
            }
        }
    }
}

/// Ordered list of handlers behind one entry point.
#[derive(Clone, Default)]
pub struct Pipeline {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Pipeline {
    /// Compose handlers in the given order.
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self { handlers }
    }

    /// Append a handler.
    pub fn with(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// The standard development-server chain.
    pub fn standard(context: PipelineContext) -> Self {
        let mut pipeline = Pipeline::default();

        if let Some(public_dir) = context.public_dir {
            pipeline = pipeline.with(StaticFiles::new(public_dir));
        }

        pipeline
            .with(RawBodyCapture::new(MAX_BODY_SIZE))
            .with(DevToolsLauncher::new(
                context.debugger,
                Arc::clone(&context.launcher),
            ))
            .with(LiveReload::new(Arc::clone(&context.tracker)))
            .with(StatusPage)
            .with(Symbolicate::new(Arc::clone(&context.bundle)))
            .with(OpenInEditor::new(context.launcher))
            .with(Systrace::new(context.systrace_dir))
            .with(RequestLogger)
            .with(BundleServer::new(context.tracker, context.bundle))
            .with(MissingBundle)
    }

    /// Handler names in dispatch order.
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    /// Run a request through the pipeline.
    pub async fn handle(&self, req: Request) -> Response {
        Next {
            handlers: &self.handlers,
        }
        .run(req)
        .await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("handlers", &self.names())
            .finish()
    }
}

/// Everything the standard handlers need.
pub struct PipelineContext {
    /// Build state, for live reload and bundle serving
    pub tracker: Arc<CompileTracker>,
    /// Debugger channel, to avoid launching a second debugger UI
    pub debugger: Arc<DebuggerChannel>,
    /// Compiler output
    pub bundle: SharedBundle,
    /// Browser and editor launcher
    pub launcher: Arc<dyn Launcher>,
    /// Directory of static files served before anything else
    pub public_dir: Option<PathBuf>,
    /// Where systrace dumps are written
    pub systrace_dir: PathBuf,
}

/// Plain-text response.
pub(crate) fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}
