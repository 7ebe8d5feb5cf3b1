//! Layered configuration for `haul start`.
//!
//! Merges settings from defaults, a config file, environment variables and
//! command-line flags. Priority: CLI > Environment > File > Defaults.
//!
//! Keys are snake_case in every source, so `out_dir` in `haul.config.toml`,
//! `"out_dir"` in `haul.config.json` and `HAUL_OUT_DIR` all set the same field.

mod loading;
mod validation;

pub use loading::CONFIG_FILE_NAMES;

use crate::error::{ConfigError, Result};
use haul_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};

/// Default aggregation window for file changes, in milliseconds.
pub const DEFAULT_AGGREGATE_TIMEOUT_MS: u64 = 300;

/// Default size above which an output file produces a build warning.
pub const DEFAULT_ASSET_SIZE_LIMIT: u64 = 5 * 1024 * 1024;

/// Haul configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HaulConfig {
    /// Interface to listen on
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Directory the external compiler writes its output to
    pub out_dir: PathBuf,

    /// Directory watched for source changes
    pub watch_dir: PathBuf,

    /// Shell command that builds the bundle into `out_dir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,

    /// Directory of static files (e.g. the debugger UI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,

    /// Where posted systrace dumps are written
    pub systrace_dir: PathBuf,

    /// Upgrade path of the debugger channel
    pub debugger_path: String,

    /// Upgrade path of the hot-update channel
    pub hmr_path: String,

    /// Patterns ignored by the watcher (`node_modules`, `*.log`)
    pub watch_ignore: Vec<String>,

    /// Quiet period after the last change before a rebuild starts
    pub aggregate_timeout_ms: u64,

    /// Output files larger than this produce a build warning
    pub asset_size_limit: u64,

    /// Open the server URL in a browser on start
    pub open: bool,

    /// Editor command for stack frames (falls back to $VISUAL / $EDITOR)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
}

impl Default for HaulConfig {
    fn default() -> Self {
        let server = ServerConfig::default();

        Self {
            // All interfaces, so devices on the network can reach the bundle
            host: "0.0.0.0".to_string(),
            port: server.addr.port(),
            out_dir: PathBuf::from("dist"),
            watch_dir: PathBuf::from("."),
            build_command: None,
            public_dir: None,
            systrace_dir: std::env::temp_dir(),
            debugger_path: server.debugger_path,
            hmr_path: server.hmr_path,
            watch_ignore: vec!["node_modules".to_string(), "*.log".to_string()],
            aggregate_timeout_ms: DEFAULT_AGGREGATE_TIMEOUT_MS,
            asset_size_limit: DEFAULT_ASSET_SIZE_LIMIT,
            open: false,
            editor: None,
        }
    }
}

impl HaulConfig {
    /// Make every relative directory absolute against `cwd`.
    pub fn resolve_paths(mut self, cwd: &Path) -> Self {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            }
        };

        self.out_dir = resolve(&self.out_dir);
        self.watch_dir = resolve(&self.watch_dir);
        self.systrace_dir = resolve(&self.systrace_dir);
        self.public_dir = self.public_dir.as_deref().map(resolve);
        self
    }

    /// Listener address and channel paths for the server core.
    pub fn server_config(&self) -> Result<ServerConfig> {
        let invalid_host = |hint: String| ConfigError::InvalidValue {
            field: "host".to_string(),
            value: self.host.clone(),
            hint,
        };

        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| invalid_host(format!("Could not resolve host: {}", e)))?
            .next()
            .ok_or_else(|| invalid_host("Host resolved to no addresses".to_string()))?;

        Ok(ServerConfig {
            addr,
            debugger_path: self.debugger_path.clone(),
            hmr_path: self.hmr_path.clone(),
        })
    }

    /// URL for humans: wildcard hosts are shown as `localhost`.
    ///
    /// Takes the port actually bound, which differs from `port` when it is 0.
    pub fn display_url(&self, port: u16) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "localhost",
            host => host,
        };
        format!("http://{}:{}", host, port)
    }
}
