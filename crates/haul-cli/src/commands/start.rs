//! `haul start`: the development session.
//!
//! 1. Load and validate configuration
//! 2. Bind the server (a busy port is fatal)
//! 3. Run the initial build
//! 4. Rebuild on every aggregated batch of file changes
//! 5. Shut down gracefully on Ctrl+C

use crate::cli::StartArgs;
use crate::compiler::{Compilation, ExternalCompiler};
use crate::config::HaulConfig;
use crate::error::{CliError, Result};
use crate::ui;
use crate::watcher::{aggregate, FileChange, FileWatcher, WatchFilter};
use haul_server::{
    BoundServer, BuildCallbacks, BuildLifecycle, DevServer, Launcher, Pipeline, PipelineContext,
    SharedBundle, ShutdownHandle, StatsSnapshot, SystemLauncher,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;

/// Execute the start command.
pub async fn execute(args: StartArgs) -> Result<()> {
    let cwd = match &args.cwd {
        Some(dir) => std::env::current_dir()?.join(dir),
        None => std::env::current_dir()?,
    };

    let config = HaulConfig::load(&args, &cwd)?;
    config.validate()?;

    if config.build_command.is_none() {
        ui::warning(&format!(
            "No build command configured, serving {} as-is",
            config.out_dir.display()
        ));
    }

    let session = Session::bind(config, cwd).await?;
    let url = session.url();
    ui::success(&format!("Listening on {}", url));

    if session.config.open {
        match SystemLauncher::default().open_url(&url) {
            Ok(()) => ui::info(&format!("Opened browser at {}", url)),
            Err(e) => ui::warning(&format!("Failed to open browser: {}", e)),
        }
    }

    let shutdown = session.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ui::info("Shutting down...");
            shutdown.shutdown();
        }
    });

    session.run().await
}

/// Lifecycle callbacks that report to the terminal.
fn terminal_callbacks() -> BuildCallbacks {
    BuildCallbacks::new()
        .on_invalid(|had_issues| {
            if had_issues {
                ui::info("Files changed, rebuilding (previous build had issues)...");
            } else {
                ui::info("Files changed, rebuilding...");
            }
        })
        .on_compile(ui::print_build_result)
}

/// A bound server plus everything that feeds it builds.
pub struct Session {
    config: HaulConfig,
    server: DevServer,
    bound: BoundServer,
    bundle: SharedBundle,
    compiler: ExternalCompiler,
}

impl Session {
    /// Bind the server for `config` without serving yet.
    ///
    /// `config` paths must already be resolved. The build command runs in `cwd`.
    pub async fn bind(config: HaulConfig, cwd: PathBuf) -> Result<Self> {
        Self::bind_with(config, cwd, terminal_callbacks()).await
    }

    /// Like [`bind`](Self::bind), reporting build events to `callbacks`.
    pub async fn bind_with(
        config: HaulConfig,
        cwd: PathBuf,
        callbacks: BuildCallbacks,
    ) -> Result<Self> {
        let server = DevServer::new(config.server_config()?, callbacks);
        let bundle = SharedBundle::default();

        let launcher: Arc<dyn Launcher> =
            Arc::new(SystemLauncher::with_editor(config.editor.clone()));
        let pipeline = Pipeline::standard(PipelineContext {
            tracker: Arc::clone(server.tracker()),
            debugger: Arc::clone(server.debugger()),
            bundle: Arc::clone(&bundle),
            launcher,
            public_dir: config.public_dir.clone(),
            systrace_dir: config.systrace_dir.clone(),
        });
        tracing::debug!(handlers = ?pipeline.names(), "pipeline");

        let bound = server.bind(pipeline).await?;

        let compiler = ExternalCompiler::new(
            cwd,
            config.out_dir.clone(),
            config.build_command.clone(),
        )
        .with_asset_size_limit(config.asset_size_limit);

        Ok(Self {
            config,
            server,
            bound,
            bundle,
            compiler,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.bound.local_addr()
    }

    /// URL to show the user.
    pub fn url(&self) -> String {
        self.config.display_url(self.local_addr().port())
    }

    /// Handle that stops [`Session::run`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.server.shutdown_handle()
    }

    /// Serve, build, and rebuild on changes until shutdown.
    pub async fn run(self) -> Result<()> {
        let Session {
            config,
            server,
            bound,
            bundle,
            mut compiler,
        } = self;

        let filter = WatchFilter::new(
            config.watch_dir.clone(),
            config.watch_ignore.clone(),
            vec![config.out_dir.clone()],
        );
        let (_watcher, mut changes) = FileWatcher::new(filter)?;
        let window = Duration::from_millis(config.aggregate_timeout_ms);

        let lifecycle = server.lifecycle();
        let mut serving = tokio::spawn(bound.serve());

        ui::info("Building...");
        lifecycle.on_build_start();
        tokio::select! {
            result = &mut serving => return finish(result),
            _ = run_build(&mut compiler, &lifecycle, &bundle) => {}
        }

        loop {
            tokio::select! {
                result = &mut serving => return finish(result),
                change = changes.recv() => {
                    let Some(first) = change else {
                        tracing::warn!("file watcher stopped");
                        break;
                    };

                    lifecycle.on_build_invalid();
                    let batch = collect_batch(&mut changes, first, window).await;

                    tokio::select! {
                        result = &mut serving => return finish(result),
                        _ = run_build(&mut compiler, &lifecycle, &bundle) => {
                            tracing::debug!(changes = batch.len(), "rebuilt");
                        }
                    }
                }
            }
        }

        // Watching ended on its own; keep serving the last build
        finish(serving.await)
    }
}

async fn collect_batch(
    changes: &mut mpsc::Receiver<FileChange>,
    first: FileChange,
    window: Duration,
) -> Vec<FileChange> {
    let batch = aggregate(changes, first, window).await;
    for change in &batch {
        ui::debug(&format!("{:?}", change));
    }
    batch
}

/// Compile, publish the new bundle, then report the build as done.
async fn run_build(
    compiler: &mut ExternalCompiler,
    lifecycle: &BuildLifecycle,
    bundle: &SharedBundle,
) {
    let stats = match compiler.compile().await {
        Ok(Compilation {
            bundle: output,
            stats,
        }) => {
            *bundle.write() = output;
            stats
        }
        Err(e) => {
            tracing::error!(error = %e, "build command could not run");
            StatsSnapshot {
                errors: vec![e.to_string()],
                ..StatsSnapshot::default()
            }
        }
    };

    lifecycle.on_build_done(stats);
}

/// Flatten the serve task's outcome.
fn finish(result: std::result::Result<haul_server::Result<()>, JoinError>) -> Result<()> {
    result
        .map_err(|e| CliError::Custom(format!("Server task failed: {}", e)))?
        .map_err(CliError::from)
}
