//! Launching the browser and the editor.

use std::io;
use std::path::Path;
use std::process::Command;

/// Opens URLs and source files on the developer's machine.
pub trait Launcher: Send + Sync {
    /// Open a URL in the default browser.
    fn open_url(&self, url: &str) -> io::Result<()>;

    /// Open a file in the editor, at a line when given.
    fn open_in_editor(&self, file: &Path, line: Option<u32>) -> io::Result<()>;
}

/// Launcher that spawns platform commands.
///
/// Uses platform-specific commands for the browser:
/// - macOS: `open`
/// - Windows: `start`
/// - Linux: `xdg-open`
///
/// The editor is the configured one, else `$VISUAL`, else `$EDITOR`.
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher {
    editor: Option<String>,
}

impl SystemLauncher {
    /// Create a launcher with an explicit editor command.
    pub fn with_editor(editor: Option<String>) -> Self {
        Self { editor }
    }

    fn editor(&self) -> Option<String> {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .filter(|editor| !editor.trim().is_empty())
    }
}

impl Launcher for SystemLauncher {
    fn open_url(&self, url: &str) -> io::Result<()> {
        let result = if cfg!(target_os = "macos") {
            Command::new("open").arg(url).spawn()
        } else if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", "start", url]).spawn()
        } else {
            Command::new("xdg-open").arg(url).spawn()
        };

        result.map(|_| ())
    }

    fn open_in_editor(&self, file: &Path, line: Option<u32>) -> io::Result<()> {
        let editor = self.editor().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "no editor configured (set `editor` in haul.config or $EDITOR)",
            )
        })?;

        let mut words = editor.split_whitespace();
        let program = words.next().unwrap_or_default();
        let mut command = Command::new(program);
        command.args(words);
        command.args(editor_args(program, file, line));
        command.spawn().map(|_| ())
    }
}

/// Arguments that open `file` at `line` for well-known editors.
pub(crate) fn editor_args(program: &str, file: &Path, line: Option<u32>) -> Vec<String> {
    let file = file.display().to_string();
    let Some(line) = line else {
        return vec![file];
    };

    let name = Path::new(program)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(program);

    match name {
        "code" | "code-insiders" | "codium" | "cursor" => {
            vec!["-g".to_string(), format!("{}:{}", file, line)]
        }
        "subl" | "sublime_text" | "atom" | "zed" => vec![format!("{}:{}", file, line)],
        "vim" | "nvim" | "vi" | "emacs" | "emacsclient" | "nano" | "mate" => {
            vec![format!("+{}", line), file]
        }
        "idea" | "webstorm" | "phpstorm" => {
            vec!["--line".to_string(), line.to_string(), file]
        }
        _ => vec![file],
    }
}
