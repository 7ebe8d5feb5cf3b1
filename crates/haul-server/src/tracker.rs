//! Build lifecycle tracking.
//!
//! The tracker owns the "did the last build have issues" flag that the
//! invalidation callback reports, plus the current [`BuildStatus`]. One
//! tracker belongs to one server, so several servers in a process never share
//! state.

use crate::stats::StatsSnapshot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Build status as seen by connected clients.
///
/// Legal transitions: `Idle -> Compiling`, `Compiling -> Succeeded | SucceededWithIssues`,
/// `Succeeded* -> Compiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStatus {
    /// No build has been performed yet
    Idle,
    /// Build is currently in progress
    Compiling,
    /// Last build finished without errors or warnings
    Succeeded,
    /// Last build finished with errors or warnings
    SucceededWithIssues,
}

impl BuildStatus {
    /// Check if a build is currently running.
    pub fn is_compiling(&self) -> bool {
        matches!(self, BuildStatus::Compiling)
    }

    /// Check if a build has completed (with or without issues).
    pub fn is_settled(&self) -> bool {
        matches!(self, BuildStatus::Succeeded | BuildStatus::SucceededWithIssues)
    }

    /// Whether `self -> next` is one of the legal transitions.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        matches!(
            (self, next),
            (BuildStatus::Idle, BuildStatus::Compiling)
                | (
                    BuildStatus::Compiling,
                    BuildStatus::Succeeded | BuildStatus::SucceededWithIssues
                )
                | (
                    BuildStatus::Succeeded | BuildStatus::SucceededWithIssues,
                    BuildStatus::Compiling
                )
        )
    }
}

/// Status plus a counter of completed builds, published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    /// Current status
    pub status: BuildStatus,
    /// Number of `done` events seen so far
    pub completed_builds: u64,
}

/// Called on `invalid` with whether the previous completed build had issues.
pub type InvalidCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Called on `done` with the compiler's stats.
pub type CompileCallback = Box<dyn Fn(&StatsSnapshot) + Send + Sync>;

/// Caller-supplied lifecycle callbacks. Both are optional.
#[derive(Default)]
pub struct BuildCallbacks {
    on_invalid: Option<InvalidCallback>,
    on_compile: Option<CompileCallback>,
}

impl BuildCallbacks {
    /// Create an empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the invalidation callback.
    pub fn on_invalid(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_invalid = Some(Box::new(callback));
        self
    }

    /// Register the compile callback.
    pub fn on_compile(
        mut self,
        callback: impl Fn(&StatsSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_compile = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for BuildCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildCallbacks")
            .field("on_invalid", &self.on_invalid.is_some())
            .field("on_compile", &self.on_compile.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct TrackerState {
    status: BuildStatus,
    /// Issue state of the last completed build
    had_issues: bool,
    last_stats: Option<Arc<StatsSnapshot>>,
    completed_builds: u64,
}

/// Single-owner state cell driven by the compiler's lifecycle events.
///
/// Callbacks run synchronously on the caller's task, after the internal lock
/// is released, so a callback may read the tracker without deadlocking.
#[derive(Debug)]
pub struct CompileTracker {
    state: Mutex<TrackerState>,
    progress: watch::Sender<BuildProgress>,
    callbacks: BuildCallbacks,
}

impl CompileTracker {
    /// Create a tracker in the `Idle` state.
    pub fn new(callbacks: BuildCallbacks) -> Self {
        let (progress, _) = watch::channel(BuildProgress {
            status: BuildStatus::Idle,
            completed_builds: 0,
        });

        Self {
            state: Mutex::new(TrackerState {
                status: BuildStatus::Idle,
                had_issues: false,
                last_stats: None,
                completed_builds: 0,
            }),
            progress,
            callbacks,
        }
    }

    /// Mark a build as started without firing any callback.
    ///
    /// Used for the first compilation, which the compiler reports with `done`
    /// only. Calling it while already compiling is a no-op.
    pub fn on_build_start(&self) {
        let mut state = self.state.lock();
        self.transition(&mut state, BuildStatus::Compiling);
    }

    /// Handle the compiler's `invalid` event.
    ///
    /// The callback receives the issue state of the previous completed build,
    /// since the outcome of the build about to run is unknown.
    pub fn on_build_invalid(&self) {
        let had_issues = self.state.lock().had_issues;

        if let Some(callback) = &self.callbacks.on_invalid {
            callback(had_issues);
        }

        let mut state = self.state.lock();
        self.transition(&mut state, BuildStatus::Compiling);
    }

    /// Handle the compiler's `done` event.
    ///
    /// Returns whether the finished build has issues. A `done` that arrives
    /// without a preceding start is treated as if the build had started
    /// implicitly, so only legal transitions are ever observed.
    pub fn on_build_done(&self, stats: Arc<StatsSnapshot>) -> bool {
        let has_issues = stats.has_issues();

        {
            let mut state = self.state.lock();
            if !state.status.is_compiling() {
                tracing::debug!(
                    status = ?state.status,
                    "build finished without a start event, assuming implicit start"
                );
                self.transition(&mut state, BuildStatus::Compiling);
            }

            state.had_issues = has_issues;
            state.last_stats = Some(Arc::clone(&stats));
            state.completed_builds += 1;

            let next = if has_issues {
                BuildStatus::SucceededWithIssues
            } else {
                BuildStatus::Succeeded
            };
            self.transition(&mut state, next);
        }

        if let Some(callback) = &self.callbacks.on_compile {
            callback(&stats);
        }

        has_issues
    }

    /// Get current build status.
    pub fn status(&self) -> BuildStatus {
        self.state.lock().status
    }

    /// Issue state of the last completed build.
    pub fn had_issues(&self) -> bool {
        self.state.lock().had_issues
    }

    /// Stats of the last completed build, if any.
    pub fn last_stats(&self) -> Option<Arc<StatsSnapshot>> {
        self.state.lock().last_stats.clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<BuildProgress> {
        self.progress.subscribe()
    }

    /// Wait until no build is running.
    ///
    /// Returns immediately when idle or settled.
    pub async fn wait_until_settled(&self) -> BuildStatus {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|progress| !progress.status.is_compiling()).await {
            Ok(progress) => progress.status,
            Err(_) => self.status(),
        };
        settled
    }

    /// Wait for the next `done` event after this call.
    pub async fn wait_for_next_build(&self) -> BuildProgress {
        let mut rx = self.subscribe();
        let seen = rx.borrow_and_update().completed_builds;
        let next = match rx.wait_for(|progress| progress.completed_builds > seen).await {
            Ok(progress) => *progress,
            Err(_) => BuildProgress {
                status: self.status(),
                completed_builds: seen,
            },
        };
        next
    }

    fn transition(&self, state: &mut TrackerState, next: BuildStatus) {
        if state.status == next {
            return;
        }

        debug_assert!(
            state.status.can_transition_to(next),
            "illegal build status transition {:?} -> {:?}",
            state.status,
            next
        );

        tracing::debug!(from = ?state.status, to = ?next, "build status changed");
        state.status = next;
        self.progress.send_replace(BuildProgress {
            status: next,
            completed_builds: state.completed_builds,
        });
    }
}

impl Default for CompileTracker {
    fn default() -> Self {
        Self::new(BuildCallbacks::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::time::Duration;

    fn clean() -> Arc<StatsSnapshot> {
        Arc::new(StatsSnapshot::default())
    }

    fn failing() -> Arc<StatsSnapshot> {
        Arc::new(StatsSnapshot {
            errors: vec!["SyntaxError: Unexpected token".to_string()],
            ..Default::default()
        })
    }

    fn recording_tracker() -> (CompileTracker, Arc<PlMutex<Vec<String>>>) {
        let log = Arc::new(PlMutex::new(Vec::new()));
        let invalid_log = Arc::clone(&log);
        let compile_log = Arc::clone(&log);

        let callbacks = BuildCallbacks::new()
            .on_invalid(move |after_error| invalid_log.lock().push(format!("invalid:{}", after_error)))
            .on_compile(move |stats| {
                compile_log
                    .lock()
                    .push(format!("compile:{}", stats.errors.len()))
            });

        (CompileTracker::new(callbacks), log)
    }

    #[test]
    fn test_starts_idle() {
        let tracker = CompileTracker::default();
        assert_eq!(tracker.status(), BuildStatus::Idle);
        assert!(!tracker.had_issues());
        assert!(tracker.last_stats().is_none());
    }

    #[test]
    fn test_clean_build_succeeds() {
        let tracker = CompileTracker::default();
        tracker.on_build_start();
        assert_eq!(tracker.status(), BuildStatus::Compiling);

        assert!(!tracker.on_build_done(clean()));
        assert_eq!(tracker.status(), BuildStatus::Succeeded);
    }

    #[test]
    fn test_failing_build_has_issues() {
        let tracker = CompileTracker::default();
        tracker.on_build_start();

        assert!(tracker.on_build_done(failing()));
        assert_eq!(tracker.status(), BuildStatus::SucceededWithIssues);
        assert!(tracker.had_issues());
    }

    #[test]
    fn test_invalid_reports_previous_issue_state() {
        let (tracker, log) = recording_tracker();

        tracker.on_build_invalid();
        tracker.on_build_done(failing());
        tracker.on_build_invalid();
        tracker.on_build_done(clean());
        tracker.on_build_invalid();

        assert_eq!(
            *log.lock(),
            vec![
                "invalid:false",
                "compile:1",
                "invalid:true",
                "compile:0",
                "invalid:false",
            ]
        );
        assert_eq!(tracker.status(), BuildStatus::Compiling);
    }

    #[test]
    fn test_exactly_one_callback_per_event() {
        let (tracker, log) = recording_tracker();

        tracker.on_build_start();
        assert!(log.lock().is_empty());

        tracker.on_build_done(clean());
        assert_eq!(log.lock().len(), 1);

        tracker.on_build_invalid();
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_consecutive_done_keeps_latest_issue_state() {
        let (tracker, log) = recording_tracker();

        tracker.on_build_start();
        tracker.on_build_done(failing());
        // Second done without an intervening invalid
        tracker.on_build_done(clean());
        assert_eq!(tracker.status(), BuildStatus::Succeeded);

        tracker.on_build_invalid();
        assert_eq!(log.lock().last().map(String::as_str), Some("invalid:false"));
    }

    #[test]
    fn test_done_from_idle_passes_through_compiling() {
        let tracker = CompileTracker::default();
        let mut rx = tracker.subscribe();

        tracker.on_build_done(clean());

        assert!(rx.has_changed().unwrap());
        let progress = *rx.borrow_and_update();
        assert_eq!(progress.status, BuildStatus::Succeeded);
        assert_eq!(progress.completed_builds, 1);
    }

    #[test]
    fn test_transition_table() {
        use BuildStatus::*;

        assert!(Idle.can_transition_to(Compiling));
        assert!(Compiling.can_transition_to(Succeeded));
        assert!(Compiling.can_transition_to(SucceededWithIssues));
        assert!(Succeeded.can_transition_to(Compiling));
        assert!(SucceededWithIssues.can_transition_to(Compiling));

        assert!(!Idle.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(SucceededWithIssues));
        assert!(!Compiling.can_transition_to(Idle));
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&BuildStatus::SucceededWithIssues).unwrap();
        assert_eq!(json, r#""succeeded-with-issues""#);
    }

    #[test]
    fn test_last_stats_replaced_by_next_done() {
        let tracker = CompileTracker::default();
        tracker.on_build_done(failing());
        tracker.on_build_invalid();
        tracker.on_build_done(clean());

        let last = tracker.last_stats().unwrap();
        assert!(last.errors.is_empty());
    }

    #[tokio::test]
    async fn test_wait_until_settled_returns_after_done() {
        let tracker = Arc::new(CompileTracker::default());
        tracker.on_build_start();

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_until_settled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tracker.on_build_done(clean());
        let status = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(status, BuildStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_wait_until_settled_is_immediate_when_not_compiling() {
        let tracker = CompileTracker::default();
        let status = tokio::time::timeout(Duration::from_millis(100), tracker.wait_until_settled())
            .await
            .expect("idle tracker is already settled");
        assert_eq!(status, BuildStatus::Idle);

        tracker.on_build_done(failing());
        assert_eq!(tracker.wait_until_settled().await, BuildStatus::SucceededWithIssues);
    }

    #[tokio::test]
    async fn test_wait_for_next_build_ignores_past_builds() {
        let tracker = Arc::new(CompileTracker::default());
        tracker.on_build_done(clean());

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_for_next_build().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tracker.on_build_invalid();
        tracker.on_build_done(failing());

        let progress = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(progress.completed_builds, 2);
        assert_eq!(progress.status, BuildStatus::SucceededWithIssues);
    }
}
