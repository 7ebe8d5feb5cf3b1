//! Recursive file watching with change aggregation.
//!
//! The watcher forwards every relevant change as it happens; [`aggregate`]
//! then collects a burst of changes into one batch so a save-all in the
//! editor triggers one rebuild, not twenty.

use crate::error::{CliError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Capacity of the change channel.
const CHANNEL_CAPACITY: usize = 256;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File was modified
    Modified(PathBuf),
    /// File was created
    Created(PathBuf),
    /// File was removed
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    fn from_event(kind: &EventKind, path: PathBuf) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            _ => None,
        }
    }
}

/// Which paths under the root are worth a rebuild.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    patterns: Vec<String>,
    ignored_dirs: Vec<PathBuf>,
}

impl WatchFilter {
    /// Filter for `root`, skipping `patterns` and everything under `ignored_dirs`.
    ///
    /// Patterns are either `*.ext` suffixes or names matched against every
    /// path component (`node_modules`) or a leading relative path (`src/gen`).
    pub fn new(root: PathBuf, patterns: Vec<String>, ignored_dirs: Vec<PathBuf>) -> Self {
        Self {
            root: canonical(root),
            patterns,
            ignored_dirs: ignored_dirs.into_iter().map(canonical).collect(),
        }
    }

    /// Check if a change to `path` should be dropped.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let Ok(rel_path) = path.strip_prefix(&self.root) else {
            return true;
        };

        if self.ignored_dirs.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }

        // Hidden files and directories (.git, .DS_Store, editor swap files)
        let hidden = rel_path.components().any(|component| {
            matches!(component, Component::Normal(name) if name.to_string_lossy().starts_with('.'))
        });
        if hidden {
            return true;
        }

        self.patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                rel_path.to_string_lossy().ends_with(suffix)
            } else {
                rel_path.starts_with(pattern)
                    || rel_path
                        .components()
                        .any(|component| component.as_os_str() == pattern.as_str())
            }
        })
    }
}

/// Resolve symlinks so paths reported by the OS compare equal.
fn canonical(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

/// Recursive watcher over one directory.
///
/// Dropping it stops watching and closes the change channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `filter`'s root.
    ///
    /// # Errors
    ///
    /// Returns error if the root doesn't exist or the OS watcher can't start.
    pub fn new(filter: WatchFilter) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let root = filter.root.clone();
        if !root.is_dir() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "watch error");
                    return;
                }
            };

            for path in event.paths {
                if filter.should_ignore(&path) {
                    continue;
                }
                if let Some(change) = FileChange::from_event(&event.kind, path) {
                    // Receiver gone means the session is over
                    if tx.blocking_send(change).is_err() {
                        return;
                    }
                }
            }
        })
        .map_err(CliError::Watch)?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(CliError::Watch)?;
        tracing::debug!(root = %root.display(), "watching");

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    /// Get the root directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Collect `first` and every change that follows within `window` of the
/// previous one. One entry per path, the latest change wins.
pub async fn aggregate(
    rx: &mut mpsc::Receiver<FileChange>,
    first: FileChange,
    window: Duration,
) -> Vec<FileChange> {
    let mut batch = BTreeMap::new();
    batch.insert(first.path().to_path_buf(), first);

    while let Ok(Some(change)) = tokio::time::timeout(window, rx.recv()).await {
        batch.insert(change.path().to_path_buf(), change);
    }

    batch.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str], ignored_dirs: &[&str]) -> WatchFilter {
        WatchFilter::new(
            PathBuf::from("/project"),
            patterns.iter().map(|p| p.to_string()).collect(),
            ignored_dirs.iter().map(PathBuf::from).collect(),
        )
    }

    #[test]
    fn test_ignore_patterns() {
        let filter = filter(&["node_modules", "*.log", "src/generated"], &[]);

        assert!(filter.should_ignore(Path::new("/project/node_modules/react/index.js")));
        assert!(filter.should_ignore(Path::new("/project/packages/a/node_modules/x.js")));
        assert!(filter.should_ignore(Path::new("/project/debug.log")));
        assert!(filter.should_ignore(Path::new("/project/src/generated/api.js")));

        assert!(!filter.should_ignore(Path::new("/project/src/index.js")));
        assert!(!filter.should_ignore(Path::new("/project/src/node_modules_shim.js")));
    }

    #[test]
    fn test_ignore_hidden_and_outside_root() {
        let filter = filter(&[], &[]);

        assert!(filter.should_ignore(Path::new("/project/.git/index")));
        assert!(filter.should_ignore(Path::new("/project/src/.index.js.swp")));
        assert!(filter.should_ignore(Path::new("/elsewhere/index.js")));
    }

    #[test]
    fn test_ignore_output_dir() {
        let filter = filter(&[], &["/project/dist"]);

        assert!(filter.should_ignore(Path::new("/project/dist/index.bundle")));
        assert!(!filter.should_ignore(Path::new("/project/distribution/a.js")));
    }

    #[tokio::test]
    async fn test_aggregate_batches_until_quiet() {
        let (tx, mut rx) = mpsc::channel(8);
        let a = PathBuf::from("/project/a.js");
        let b = PathBuf::from("/project/b.js");

        tx.send(FileChange::Modified(b.clone())).await.unwrap();
        tx.send(FileChange::Removed(a.clone())).await.unwrap();

        let batch = aggregate(
            &mut rx,
            FileChange::Created(a.clone()),
            Duration::from_millis(20),
        )
        .await;

        assert_eq!(
            batch,
            vec![FileChange::Removed(a), FileChange::Modified(b)]
        );
    }

    #[tokio::test]
    async fn test_aggregate_ends_when_channel_closes() {
        let (tx, mut rx) = mpsc::channel::<FileChange>(1);
        drop(tx);

        let first = FileChange::Modified(PathBuf::from("/project/a.js"));
        let batch = aggregate(&mut rx, first.clone(), Duration::from_secs(30)).await;
        assert_eq!(batch, vec![first]);
    }

    #[tokio::test]
    async fn test_watcher_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let (_watcher, mut rx) =
            FileWatcher::new(WatchFilter::new(root.clone(), vec![], vec![])).unwrap();

        std::fs::write(root.join("index.js"), "1").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.path().file_name().unwrap(), "index.js");
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let result = FileWatcher::new(WatchFilter::new(missing, vec![], vec![]));
        assert!(matches!(result, Err(CliError::FileNotFound(_))));
    }
}
