//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif byte bar for the running upload.
//! Non-TTY mode, `--quiet` or `--no-progress`: hidden bar, logs only.

use std::io::IsTerminal;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Byte bar: green fill, binary units, throughput and ETA
fn upload_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{prefix:<24.dim} {bar:30.green/dim} {binary_bytes:>9}/{binary_total_bytes:9} {binary_bytes_per_sec:>11} {eta:>4}",
        )
        .expect("invalid template")
        .progress_chars("--")
}

/// Keep bar prefixes aligned; cut on a char boundary.
fn display_name(name: &str) -> String {
    const MAX: usize = 24;
    if name.chars().count() <= MAX {
        return name.to_string();
    }
    let head: String = name.chars().take(MAX - 1).collect();
    format!("{head}~")
}

/// Owns the `MultiProgress` the logger prints through.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
    enabled: bool,
}

impl ProgressContext {
    /// Create a context, detecting TTY automatically.
    ///
    /// `enabled = false` hides every bar even on a terminal.
    pub fn new(enabled: bool) -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
            enabled,
        }
    }

    /// Bar for one file upload of `total` bytes.
    ///
    /// Hidden (no-op) when not on a terminal or when bars are disabled.
    pub fn upload_bar(&self, name: &str, total: u64) -> ProgressBar {
        if !self.shows_bars() {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(upload_style());
        pb.set_prefix(display_name(name));
        pb
    }

    pub fn shows_bars(&self) -> bool {
        self.is_tty && self.enabled
    }

    /// Get reference to `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}
