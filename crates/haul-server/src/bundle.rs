//! In-memory copy of the compiler's output, served without disk I/O.

use axum::body::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One file of the bundle output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    /// File content
    pub content: Bytes,
    /// MIME type
    pub content_type: String,
}

/// Bundle output keyed by URL path (e.g. `/index.bundle`).
#[derive(Debug, Clone, Default)]
pub struct BundleCache {
    files: HashMap<String, BundleFile>,
}

impl BundleCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, deriving the content type from the path.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Bytes>) {
        let path = path.into();
        let content_type = content_type_for(&path).to_string();
        self.files.insert(
            path,
            BundleFile {
                content: content.into(),
                content_type,
            },
        );
    }

    /// Get a file from the cache.
    pub fn get(&self, path: &str) -> Option<&BundleFile> {
        self.files.get(path)
    }

    /// Clear all cached files.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Get number of cached files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// URL paths of all cached files, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.files.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

/// Bundle cache shared between the compiler adapter and the request pipeline.
pub type SharedBundle = Arc<RwLock<BundleCache>>;

/// Determine content type from file extension.
pub fn content_type_for(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "bundle" | "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "wasm" => "application/wasm",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}
