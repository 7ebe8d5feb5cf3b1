//! Command-line interface definition for Haul.
//!
//! # Command Structure
//!
//! - `haul start` - Development server with rebuild on change, hot updates
//!   and a debugger relay

mod commands;
mod tests;

use clap::Parser;

pub use commands::{Command, StartArgs};

/// Haul - A development server for JavaScript bundles
#[derive(Parser, Debug)]
#[command(
    name = "haul",
    version,
    about = "A development server for JavaScript bundles",
    long_about = "Haul serves the output of your bundler to devices and simulators.\n\
                  It rebuilds when sources change, pushes hot updates to connected clients\n\
                  and relays messages between a remote debugger and the running app."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    ///
    /// Outputs plain text without ANSI color codes. Useful for logging to
    /// files or systems that don't support colored terminal output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
