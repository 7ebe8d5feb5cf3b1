//! Error handling for the Haul CLI.
//!
//! - **Top-level errors** (`CliError`) are what commands return
//! - **Domain-specific errors** (`ConfigError`, `CompileError`) carry the detail
//!   and an actionable `Hint:` line
//!
//! Errors are converted to `miette` reports only at the process boundary.

mod miette;

pub use self::miette::cli_error_to_miette;

use haul_server::ServerError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (file not found, invalid syntax, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The external compiler could not be run
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Listener-level failures from the development server
    #[error(transparent)]
    Server(#[from] ServerError),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The OS file watcher could not start
    #[error("File watcher error: {0}")]
    Watch(notify::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file passed with `--config` doesn't exist
    #[error("Config file not found: {}\n\nHint: Create a haul.config.json or haul.config.toml file, or fix the --config path", .0.display())]
    NotFound(PathBuf),

    /// Config sources could not be merged or deserialized
    #[error("Invalid configuration: {0}\n\nHint: Check haul.config syntax, field names and HAUL_* environment variables")]
    Invalid(String),

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },
}

/// Failures to run the external compiler at all.
///
/// A build that runs and reports errors is not a `CompileError`: its errors
/// travel in the build stats to the terminal and to hot-update clients.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The build command could not be started
    #[error("Failed to run build command `{command}`: {source}\n\nHint: Check that the command exists and is on PATH")]
    Spawn {
        /// The configured command line
        command: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The output directory could not be read
    #[error("Failed to read build output in {}: {message}\n\nHint: Check `out_dir` in your haul config", .dir.display())]
    Snapshot {
        /// Output directory
        dir: PathBuf,
        /// What went wrong
        message: String,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;
