use crate::config::HaulConfig;
use crate::error::{ConfigError, Result};

/// Longest accepted aggregation window.
const MAX_AGGREGATE_TIMEOUT_MS: u64 = 60_000;

fn invalid(field: &str, value: impl ToString, hint: impl Into<String>) -> crate::error::CliError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        hint: hint.into(),
    }
    .into()
}

impl HaulConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", "", "Use an interface address such as 127.0.0.1 or 0.0.0.0"));
        }

        for (field, path) in [
            ("debugger_path", &self.debugger_path),
            ("hmr_path", &self.hmr_path),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(field, path, "Channel paths must start with '/'"));
            }
        }

        if self.debugger_path == self.hmr_path {
            return Err(invalid(
                "hmr_path",
                &self.hmr_path,
                "The debugger and hot-update channels need different paths",
            ));
        }

        if self.aggregate_timeout_ms > MAX_AGGREGATE_TIMEOUT_MS {
            return Err(invalid(
                "aggregate_timeout_ms",
                self.aggregate_timeout_ms,
                format!("Use at most {}ms", MAX_AGGREGATE_TIMEOUT_MS),
            ));
        }

        if self.asset_size_limit == 0 {
            return Err(invalid("asset_size_limit", 0, "Use a size in bytes greater than zero"));
        }

        if let Some(command) = &self.build_command {
            if command.trim().is_empty() {
                return Err(invalid(
                    "build_command",
                    "",
                    "Remove build_command to serve an existing output directory",
                ));
            }
        }

        if !self.watch_dir.is_dir() {
            return Err(invalid(
                "watch_dir",
                self.watch_dir.display(),
                "The watched directory must exist",
            ));
        }

        if let Some(public_dir) = &self.public_dir {
            if !public_dir.is_dir() {
                return Err(invalid(
                    "public_dir",
                    public_dir.display(),
                    "Point public_dir at an existing directory or remove it",
                ));
            }
        }

        Ok(())
    }
}
