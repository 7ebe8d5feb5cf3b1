//! Haul CLI - development server for JavaScript bundles.
//!
//! Wraps [`haul_server`] with everything a terminal session needs: layered
//! configuration, an adapter that runs an external build command, file
//! watching and terminal output.
//!
//! # Architecture
//!
//! - [`cli`] - Argument definitions
//! - [`config`] - Defaults, config file, `HAUL_*` environment and flags, merged
//! - [`compiler`] - Runs the build command and snapshots its output
//! - [`watcher`] - Recursive file watching with change aggregation
//! - [`commands`] - `haul start`
//! - [`error`] - Error types with actionable hints
//! - [`logger`] / [`ui`] - Structured logs and status lines
//!
//! # Example
//!
//! ```rust,no_run
//! use haul_cli::{commands::start::Session, config::HaulConfig, error::Result};
//!
//! # async fn run() -> Result<()> {
//! let cwd = std::env::current_dir()?;
//! let config = HaulConfig::default().resolve_paths(&cwd);
//! config.validate()?;
//!
//! let session = Session::bind(config, cwd).await?;
//! println!("serving on {}", session.url());
//! session.run().await
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod error;
pub mod logger;
pub mod ui;
pub mod watcher;

pub use error::{CliError, CompileError, ConfigError, Result};
