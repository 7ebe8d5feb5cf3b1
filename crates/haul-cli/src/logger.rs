//! Logging setup for the Haul CLI.
//!
//! Log lines come from two crates: `haul_server` (listener, channels, request
//! pipeline) and `haul_cli` (config, builds, file watching). Both share one
//! filter.
//!
//! ```rust,no_run
//! use haul_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!(port = 8081, "starting");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives for each verbosity level.
///
/// `RUST_LOG` is only consulted at the default level.
pub fn filter_directives(verbose: bool, quiet: bool) -> Option<&'static str> {
    if verbose {
        Some("haul_cli=debug,haul_server=debug,tower_http=debug")
    } else if quiet {
        Some("haul_cli=error,haul_server=error")
    } else {
        None
    }
}

const DEFAULT_DIRECTIVES: &str = "haul_cli=info,haul_server=info";

/// Initialize the global tracing subscriber.
///
/// Call once, before anything logs. `verbose` wins over `RUST_LOG`, which
/// wins over the default of INFO for the haul crates.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = match filter_directives(verbose, quiet) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
    };

    init_logger_with_filter(filter, no_color);
}

/// Initialize the subscriber with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
