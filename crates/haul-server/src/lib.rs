//! Haul server - development server core for a JavaScript bundler.
//!
//! Sits between an external compiler and the clients of a development
//! session: application runtimes, a remote debugger frontend, and browsers
//! listening for hot updates.
//!
//! # Architecture
//!
//! - [`tracker`] - Compile state tracker driven by the compiler's lifecycle events
//! - [`channel`] - The debugger relay and hot-update WebSocket channels
//! - [`pipeline`] - Ordered chain of HTTP request handlers
//! - [`server`] - Listener that routes upgrades to channels and everything else to the pipeline
//! - [`bundle`] - In-memory compiler output served by the pipeline
//! - [`stats`] - Build statistics reported by the compiler
//!
//! # Example
//!
//! ```rust,no_run
//! use haul_server::{BuildCallbacks, DevServer, Pipeline, ServerConfig, StatsSnapshot};
//!
//! # async fn run() -> haul_server::Result<()> {
//! let server = DevServer::new(
//!     ServerConfig::default(),
//!     BuildCallbacks::new().on_invalid(|had_issues| println!("rebuilding (issues: {})", had_issues)),
//! );
//!
//! let lifecycle = server.lifecycle();
//! lifecycle.on_build_start();
//! lifecycle.on_build_done(StatsSnapshot::default());
//!
//! server.start(Pipeline::default()).await
//! # }
//! ```

#![warn(missing_docs)]

pub mod bundle;
pub mod channel;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod stats;
pub mod tracker;

pub use bundle::{BundleCache, BundleFile, SharedBundle};
pub use channel::{DebuggerChannel, HmrChannel, HmrMessage, Role};
pub use error::{Result, ServerError};
pub use pipeline::{Handler, Launcher, Next, Pipeline, PipelineContext, SystemLauncher};
pub use server::{BoundServer, BuildLifecycle, DevServer, ServerConfig, ShutdownHandle};
pub use stats::{AssetStat, ModuleStat, StatsSnapshot};
pub use tracker::{BuildCallbacks, BuildProgress, BuildStatus, CompileTracker};
