use super::{text, Handler, Next, RawBody};
use crate::bundle::SharedBundle;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use oxc_sourcemap::SourceMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stack frame reported by the runtime. Fields we do not rewrite are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method_name: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Stack {
    stack: Vec<StackFrame>,
}

/// Maps bundle stack frames back to source on `POST /symbolicate`.
///
/// Each frame's `file` names a served bundle; its map is read from
/// `<bundle path>.map` in the same cache. Lines are 1-based, columns 0-based.
/// Frames without a usable map or mapping come back unchanged.
pub struct Symbolicate {
    bundle: SharedBundle,
}

impl Symbolicate {
    /// Resolve frames against the maps held in `bundle`.
    pub fn new(bundle: SharedBundle) -> Self {
        Self { bundle }
    }

    fn source_map(&self, bundle_path: &str) -> Option<SourceMap> {
        let content = self
            .bundle
            .read()
            .get(&format!("{}.map", bundle_path))
            .map(|file| file.content.clone())?;

        let json = std::str::from_utf8(&content).ok()?;
        match SourceMap::from_json_string(json) {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!(bundle = bundle_path, error = ?e, "unreadable source map");
                None
            }
        }
    }

    fn symbolicate(&self, stack: &mut [StackFrame]) {
        let bundles: BTreeSet<String> = stack
            .iter()
            .filter_map(|frame| frame.file.as_deref().and_then(bundle_path))
            .collect();

        for bundle in bundles {
            let Some(map) = self.source_map(&bundle) else {
                continue;
            };
            let table = map.generate_lookup_table();

            for frame in stack.iter_mut() {
                if frame.file.as_deref().and_then(bundle_path).as_deref() != Some(bundle.as_str()) {
                    continue;
                }
                let (Some(line), Some(column)) = (frame.line_number, frame.column) else {
                    continue;
                };
                let Some(token) = map.lookup_token(&table, line.saturating_sub(1), column) else {
                    continue;
                };
                let Some(source) = token.get_source_id().and_then(|id| map.get_source(id)) else {
                    continue;
                };

                frame.file = Some(source.to_string());
                frame.line_number = Some(token.get_src_line() + 1);
                frame.column = Some(token.get_src_col());
                if let Some(name) = token.get_name_id().and_then(|id| map.get_name(id)) {
                    frame.method_name = Some(name.to_string());
                }
            }
        }
    }
}

/// URL path of the bundle a frame points at, query stripped.
fn bundle_path(file: &str) -> Option<String> {
    let uri: Uri = file.parse().ok()?;
    Some(uri.path().to_string())
}

#[async_trait]
impl Handler for Symbolicate {
    fn name(&self) -> &'static str {
        "symbolicate"
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Response {
        if req.method() != Method::POST || req.uri().path() != "/symbolicate" {
            return next.run(req).await;
        }

        let body = req.extensions().get::<RawBody>().cloned().unwrap_or_default();
        let mut stack: Stack = match serde_json::from_slice(&body.0) {
            Ok(stack) => stack,
            Err(e) => return text(StatusCode::BAD_REQUEST, format!("Invalid stack: {}", e)),
        };

        self.symbolicate(&mut stack.stack);
        Json(stack).into_response()
    }
}
