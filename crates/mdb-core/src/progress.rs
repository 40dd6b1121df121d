//! Live status line for long-running publish stages
//!
//! Wraps an indicatif spinner. Each stage gets its own line that is cleared
//! when the stage ends, so interactive prompts never render underneath it.

use std::borrow::Cow;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Factory for stage status lines.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    enabled: bool,
}

impl Progress {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// Progress that never draws (tests, non-interactive output).
    pub fn hidden() -> Self {
        Self { enabled: false }
    }

    /// Start a status line for one stage.
    pub fn stage(&self, message: impl Into<Cow<'static, str>>) -> StatusLine {
        let bar = if self.enabled {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(message);
        StatusLine { bar }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

/// A single live status line. Cleared on drop.
#[derive(Debug)]
pub struct StatusLine {
    bar: ProgressBar,
}

impl StatusLine {
    pub fn set(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    /// Print a line above the spinner without disturbing it.
    pub fn println(&self, message: impl AsRef<str>) {
        if !self.bar.is_hidden() {
            self.bar.println(message);
        }
    }

    /// Cheap handle for updating the line from another thread.
    pub fn handle(&self) -> StatusHandle {
        StatusHandle {
            bar: self.bar.clone(),
        }
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for StatusLine {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Non-owning handle to a [`StatusLine`].
#[derive(Debug, Clone)]
pub struct StatusHandle {
    bar: ProgressBar,
}

impl StatusHandle {
    pub fn set(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    pub fn println(&self, message: impl AsRef<str>) {
        if !self.bar.is_hidden() {
            self.bar.println(message);
        }
    }
}

/// Bytes rendered as megabytes with three decimals.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.3}", bytes as f64 / (1024.0 * 1024.0))
}
