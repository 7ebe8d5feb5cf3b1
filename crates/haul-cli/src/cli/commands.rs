use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available Haul subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Runs the build command, serves its output and rebuilds whenever files
    /// in the watched directory change. Connected clients receive hot updates.
    Start(StartArgs),
}

/// Arguments for the start command
///
/// Every option left unset falls back to `HAUL_*` environment variables,
/// then `haul.config.json` / `haul.config.toml`, then built-in defaults.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Port to listen on [default: 8081]
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Interface to listen on [default: 0.0.0.0]
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Path to a config file
    ///
    /// Without this flag, haul.config.json and then haul.config.toml are
    /// looked up in the working directory.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the build command writes to [default: dist]
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Directory watched for changes [default: .]
    #[arg(short, long, value_name = "DIR")]
    pub watch_dir: Option<PathBuf>,

    /// Shell command that builds the bundle
    ///
    /// Runs once on start and again after every batch of changes. Without
    /// it, the output directory is served as-is and re-read on change.
    ///
    /// Examples:
    ///   haul start --build-command "npx webpack"
    ///   haul start -b "npm run bundle"
    #[arg(short, long, value_name = "COMMAND")]
    pub build_command: Option<String>,

    /// Directory of static files such as the debugger UI
    #[arg(long, value_name = "DIR")]
    pub public_dir: Option<PathBuf>,

    /// Open the server URL in a browser
    #[arg(long)]
    pub open: bool,

    /// Working directory for config lookup and relative paths
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}
