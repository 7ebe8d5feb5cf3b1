//! Terminal output for the Haul CLI.
//!
//! Status lines and build results go to stderr, so stdout stays free for
//! anything a user pipes.
//!
//! ```no_run
//! use haul_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Listening on http://localhost:8081");
//! ui::warning("No build command configured");
//! ```

mod format;
mod messages;

pub use format::{build_headline, format_duration, format_size, print_build_result};
pub use messages::{debug, error, info, success, warning};

use std::sync::atomic::{AtomicBool, Ordering};

static COLORS: AtomicBool = AtomicBool::new(false);

/// Decide whether to color output.
///
/// `NO_COLOR` beats `FORCE_COLOR`, which beats terminal detection.
pub fn color_choice(no_color_env: bool, force_color_env: bool, attended: bool) -> bool {
    if no_color_env {
        return false;
    }
    force_color_env || attended
}

/// Check if color output should be enabled for this process.
pub fn should_use_color() -> bool {
    color_choice(
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var_os("FORCE_COLOR").is_some(),
        console::user_attended_stderr(),
    )
}

/// Set up color support; `--no-color` always disables it.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

/// Whether messages are currently colored.
pub fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}

/// Apply `style` only when colors are enabled.
pub(crate) fn paint(text: &str, style: impl FnOnce(&str) -> String) -> String {
    if colors_enabled() {
        style(text)
    } else {
        text.to_string()
    }
}
