//! Formatting for sizes, durations and build results.

use super::{error, paint, success, warning};
use haul_server::StatsSnapshot;
use owo_colors::OwoColorize;
use std::time::Duration;

/// Human-readable byte count.
///
/// ```
/// use haul_cli::ui::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(2048), "2.00 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }

    match unit {
        0 => format!("{} B", bytes),
        _ => format!("{:.2} {}", size, UNITS[unit]),
    }
}

/// Human-readable duration: `340ms`, `1.25s`, `2m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// One-line summary of a finished build.
pub fn build_headline(stats: &StatsSnapshot) -> String {
    let time = format_duration(Duration::from_millis(stats.time_ms));

    if stats.has_errors() {
        format!("Build failed with {} in {}", plural(stats.errors.len(), "error"), time)
    } else if stats.has_warnings() {
        format!("Built with {} in {}", plural(stats.warnings.len(), "warning"), time)
    } else {
        format!(
            "Built {} ({} changed) in {}",
            plural(stats.modules.len(), "module"),
            stats.changed_modules().count(),
            time
        )
    }
}

/// Print a finished build to stderr: headline, then each error and warning.
pub fn print_build_result(stats: &StatsSnapshot) {
    let headline = build_headline(stats);

    if stats.has_errors() {
        error(&headline);
    } else if stats.has_warnings() {
        warning(&headline);
    } else {
        success(&headline);
    }

    for message in &stats.errors {
        eprintln!("  {} {}", paint("▸", |s| s.red().to_string()), message);
    }
    for message in &stats.warnings {
        eprintln!("  {} {}", paint("▸", |s| s.yellow().to_string()), message);
    }

    for asset in &stats.assets {
        tracing::debug!(asset = %asset.name, size = %format_size(asset.size), "emitted");
    }
}
