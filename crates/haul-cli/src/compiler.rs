//! Adapter for an external compiler.
//!
//! Haul does not bundle anything itself. A configured shell command writes
//! the bundle into `out_dir`; the adapter runs it, reads the output back
//! into memory and turns the result into [`StatsSnapshot`]s for the server.

use crate::error::CompileError;
use crate::ui::format_size;
use haul_server::{AssetStat, BundleCache, ModuleStat, StatsSnapshot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Instant;
use walkdir::WalkDir;

/// Length of the build hash, in hex characters.
const BUILD_HASH_LEN: usize = 20;

/// Output of one compile.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Files to serve, keyed by URL path
    pub bundle: BundleCache,
    /// Summary for the tracker, clients and terminal
    pub stats: StatsSnapshot,
}

/// What the build command reported.
#[derive(Debug, Default, PartialEq, Eq)]
struct CommandReport {
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Runs the build command and snapshots its output.
///
/// Keeps the content hashes of the previous build so each module can be
/// flagged as changed or not.
#[derive(Debug)]
pub struct ExternalCompiler {
    cwd: PathBuf,
    out_dir: PathBuf,
    build_command: Option<String>,
    asset_size_limit: u64,
    previous: HashMap<String, String>,
}

impl ExternalCompiler {
    /// Create a compiler writing to `out_dir`.
    ///
    /// Without a build command, every compile only re-reads `out_dir`.
    pub fn new(cwd: PathBuf, out_dir: PathBuf, build_command: Option<String>) -> Self {
        Self {
            cwd,
            out_dir,
            build_command,
            asset_size_limit: crate::config::DEFAULT_ASSET_SIZE_LIMIT,
            previous: HashMap::new(),
        }
    }

    /// Warn about output files larger than `limit` bytes.
    pub fn with_asset_size_limit(mut self, limit: u64) -> Self {
        self.asset_size_limit = limit;
        self
    }

    /// Directory the bundle is read from.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Run one build.
    ///
    /// A command that runs and fails still produces a [`Compilation`], with
    /// its errors in the stats. Only a command that can't be started or an
    /// unreadable output directory is a [`CompileError`].
    pub async fn compile(&mut self) -> Result<Compilation, CompileError> {
        let start = Instant::now();

        let mut report = match &self.build_command {
            Some(command) => self.run_command(command).await?,
            None => CommandReport::default(),
        };

        let files = if self.out_dir.is_dir() {
            let out_dir = self.out_dir.clone();
            tokio::task::spawn_blocking(move || read_output(&out_dir))
                .await
                .map_err(|e| CompileError::Snapshot {
                    dir: self.out_dir.clone(),
                    message: e.to_string(),
                })??
        } else {
            if report.errors.is_empty() {
                report.errors.push(format!(
                    "Output directory {} does not exist",
                    self.out_dir.display()
                ));
            }
            Vec::new()
        };

        let mut compilation = self.snapshot(files, report);
        compilation.stats.time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            hash = %compilation.stats.hash,
            files = compilation.bundle.len(),
            errors = compilation.stats.errors.len(),
            warnings = compilation.stats.warnings.len(),
            "compiled"
        );

        Ok(compilation)
    }

    async fn run_command(&self, command: &str) -> Result<CommandReport, CompileError> {
        tracing::debug!(command, cwd = %self.cwd.display(), "running build command");

        let output = shell(command)
            .current_dir(&self.cwd)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CompileError::Spawn {
                command: command.to_string(),
                source,
            })?;

        Ok(parse_output(&output))
    }

    /// Build the bundle and stats from the files just read.
    fn snapshot(&mut self, files: Vec<(String, Vec<u8>)>, report: CommandReport) -> Compilation {
        let CommandReport {
            errors,
            mut warnings,
        } = report;

        let mut bundle = BundleCache::new();
        let mut modules = Vec::with_capacity(files.len());
        let mut assets = Vec::with_capacity(files.len());
        let mut hashes = HashMap::with_capacity(files.len());
        let mut build_hasher = blake3::Hasher::new();

        for (url, content) in files {
            let hash = blake3::hash(&content).to_hex().to_string();
            let size = content.len() as u64;
            let name = url.trim_start_matches('/').to_string();

            if size > self.asset_size_limit {
                warnings.push(format!(
                    "Asset {} is {}, over the size limit of {}",
                    name,
                    format_size(size),
                    format_size(self.asset_size_limit)
                ));
            }

            build_hasher.update(url.as_bytes());
            build_hasher.update(hash.as_bytes());

            modules.push(ModuleStat {
                changed: self.previous.get(&url) != Some(&hash),
                id: url.clone(),
                hash: hash.clone(),
            });
            assets.push(AssetStat { name, size });
            hashes.insert(url.clone(), hash);
            bundle.insert(url, content);
        }

        // A failed command says nothing about what the next build changes
        if errors.is_empty() {
            self.previous = hashes;
        }

        let mut hash = build_hasher.finalize().to_hex().to_string();
        hash.truncate(BUILD_HASH_LEN);

        Compilation {
            bundle,
            stats: StatsSnapshot {
                hash,
                time_ms: 0,
                errors,
                warnings,
                modules,
                assets,
            },
        }
    }
}

#[cfg(not(windows))]
fn shell(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Collect warnings from both streams and, on failure, errors from stderr.
fn parse_output(output: &Output) -> CommandReport {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        tracing::debug!(target: "haul_cli::compiler::stdout", "{}", line);
    }

    let warnings = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .filter(|line| line.to_ascii_lowercase().contains("warning"))
        .map(str::to_string)
        .collect();

    let mut errors = Vec::new();
    if !output.status.success() {
        errors.extend(
            stderr
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.to_ascii_lowercase().contains("warning"))
                .map(str::to_string),
        );
        if errors.is_empty() {
            errors.push(format!("Build command failed ({})", output.status));
        }
    }

    CommandReport { errors, warnings }
}

/// Every file under `out_dir` as `(url path, content)`, sorted by path.
fn read_output(out_dir: &Path) -> Result<Vec<(String, Vec<u8>)>, CompileError> {
    let snapshot_error = |message: String| CompileError::Snapshot {
        dir: out_dir.to_path_buf(),
        message,
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(out_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| snapshot_error(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(out_dir)
            .map_err(|e| snapshot_error(e.to_string()))?;
        let url = rel_path
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .fold(String::new(), |mut url, part| {
                url.push('/');
                url.push_str(&part);
                url
            });

        let content = std::fs::read(entry.path())
            .map_err(|e| snapshot_error(format!("{}: {}", entry.path().display(), e)))?;
        files.push((url, content));
    }

    Ok(files)
}
