use crate::cli::StartArgs;
use crate::config::HaulConfig;
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format as _, Json, Serialized, Toml},
    Figment,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Config files discovered in the working directory, in lookup order.
pub const CONFIG_FILE_NAMES: &[&str] = &["haul.config.json", "haul.config.toml"];

/// Keys accepted from `HAUL_*` environment variables.
const ENV_KEYS: &[&str] = &[
    "host",
    "port",
    "out_dir",
    "watch_dir",
    "build_command",
    "public_dir",
    "systrace_dir",
    "debugger_path",
    "hmr_path",
    "watch_ignore",
    "aggregate_timeout_ms",
    "asset_size_limit",
    "open",
    "editor",
];

/// Flags the user actually passed; unset ones leave lower layers alone.
#[derive(Debug, Default, Serialize)]
struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watch_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    open: Option<bool>,
}

impl From<&StartArgs> for ConfigOverrides {
    fn from(args: &StartArgs) -> Self {
        Self {
            host: args.host.clone(),
            port: args.port,
            out_dir: args.out_dir.clone(),
            watch_dir: args.watch_dir.clone(),
            build_command: args.build_command.clone(),
            public_dir: args.public_dir.clone(),
            open: args.open.then_some(true),
        }
    }
}

impl HaulConfig {
    /// Load configuration from multiple sources.
    ///
    /// Relative paths in the result are resolved against `cwd`.
    pub fn load(args: &StartArgs, cwd: &Path) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        if let Some(path) = Self::config_file(args, cwd)? {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                _ => figment.merge(Json::file(path)),
            };
        }

        figment = figment
            .merge(Env::prefixed("HAUL_").only(ENV_KEYS))
            .merge(Serialized::defaults(ConfigOverrides::from(args)));

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(config.resolve_paths(cwd))
    }

    /// The explicit `--config` file, or the first config file found in `cwd`.
    fn config_file(args: &StartArgs, cwd: &Path) -> Result<Option<PathBuf>> {
        if let Some(path) = &args.config {
            let path = cwd.join(path);
            if !path.is_file() {
                return Err(ConfigError::NotFound(path).into());
            }
            return Ok(Some(path));
        }

        Ok(CONFIG_FILE_NAMES
            .iter()
            .map(|name| cwd.join(name))
            .find(|path| path.is_file()))
    }
}
