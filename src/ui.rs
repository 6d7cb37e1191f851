//! Narrow progress-reporting hook the resolver and installer drive. Kept
//! separate from the actual terminal rendering so tests and library
//! consumers can swap in [`NullUi`] without pulling in a spinner.

use std::io::{self, Write};

/// Callbacks the resolver/installer invoke as they make progress. None of
/// these are allowed to fail — a UI that can't render just drops the
/// update.
pub trait Ui {
    fn before_resolution(&mut self) {}
    fn after_resolution(&mut self) {}
    /// Called once per backtracking iteration with a human-readable label
    /// for what's currently being tried.
    fn indicate_progress(&mut self, _label: &str) {}
    /// Called to report the instantaneous rate of progress, in whatever
    /// unit the caller finds meaningful (iterations/sec, bytes/sec, ...).
    fn progress_rate(&mut self, _rate: f64) {}
    fn debug(&mut self, _message: &str) {}
}

/// A UI that discards every event. Default for library use and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUi;

impl Ui for NullUi {}

const SPINNER_FRAMES: &[&str] = &["-", "\\", "|", "/"];

/// Spinner-based terminal UI, redrawing the current line with ANSI escape
/// codes when writing to a TTY and falling back to one line per update
/// otherwise (so piping to a file or CI log stays readable).
pub struct TerminalUi {
    is_tty: bool,
    spinner_index: usize,
    rendered: bool,
    debug_enabled: bool,
}

impl TerminalUi {
    pub fn new(is_tty: bool, debug_enabled: bool) -> Self {
        Self {
            is_tty,
            spinner_index: 0,
            rendered: false,
            debug_enabled,
        }
    }

    fn redraw(&mut self, line: &str) {
        let spinner = SPINNER_FRAMES[self.spinner_index % SPINNER_FRAMES.len()];
        self.spinner_index = (self.spinner_index + 1) % SPINNER_FRAMES.len();
        let mut stderr = io::stderr();
        if self.is_tty {
            let _ = write!(stderr, "\r\x1b[2K{spinner} {line}");
        } else {
            let _ = writeln!(stderr, "{spinner} {line}");
        }
        let _ = stderr.flush();
        self.rendered = true;
    }
}

impl Ui for TerminalUi {
    fn before_resolution(&mut self) {
        self.redraw("Resolving dependencies...");
    }

    fn after_resolution(&mut self) {
        if !self.rendered {
            return;
        }
        let mut stderr = io::stderr();
        if self.is_tty {
            let _ = writeln!(stderr, "\r\x1b[2KResolved dependencies.");
        } else {
            let _ = writeln!(stderr, "Resolved dependencies.");
        }
        let _ = stderr.flush();
        self.rendered = false;
    }

    fn indicate_progress(&mut self, label: &str) {
        self.redraw(label);
    }

    fn progress_rate(&mut self, rate: f64) {
        if self.debug_enabled {
            self.debug(&format!("resolution rate: {rate:.1} iter/s"));
        }
    }

    fn debug(&mut self, message: &str) {
        if self.debug_enabled {
            eprintln!("[debug] {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_ui_accepts_all_calls() {
        let mut ui = NullUi;
        ui.before_resolution();
        ui.indicate_progress("trying foo 1.0.0");
        ui.progress_rate(12.5);
        ui.debug("hello");
        ui.after_resolution();
    }
}
