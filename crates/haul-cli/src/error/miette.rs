//! Conversion from CLI errors to miette reports.

use crate::error::CliError;
use haul_server::ServerError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => miette::miette!("Configuration error: {}", e),
        CliError::Server(ServerError::Bind { addr, source }) => miette::miette!(
            help = "Another process may already be using this port, try --port <PORT>",
            "Failed to bind to {}: {}",
            addr,
            source
        ),
        CliError::Server(e) => miette::miette!("Server error: {}", e),
        CliError::Watch(e) => miette::miette!(
            help = "Raise the OS watch limit (fs.inotify.max_user_watches on Linux) or narrow watch_dir",
            "File watcher error: {}",
            e
        ),
        _ => miette::miette!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_bind_error_has_help() {
        let report = cli_error_to_miette(CliError::Server(ServerError::Bind {
            addr: "127.0.0.1:8081".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        }));

        assert!(report.to_string().contains("127.0.0.1:8081"));
        assert!(report.help().is_some());
    }

    #[test]
    fn test_config_error_prefix() {
        let report = cli_error_to_miette(ConfigError::Invalid("port".to_string()).into());
        assert!(report.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_watch_error_has_help() {
        let report = cli_error_to_miette(CliError::Watch(notify::Error::generic("no space left")));
        assert!(report.to_string().contains("no space left"));
        assert!(report.help().is_some());
    }
}
