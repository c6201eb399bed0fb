//! Operator-facing output.
//!
//! Status lines, warnings and download progress all flow through an
//! [`OutputSink`] chosen once at start-up. The sink decides how progress is
//! rendered: interactive sinks redraw a progress bar, non-interactive sinks
//! never emit redraws so line-oriented log collectors stay readable.

use std::io::{self, Write};
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

/// Destination for everything the operator sees (as opposed to `tracing` diagnostics).
pub trait OutputSink: Send + Sync {
    /// Whether output is attached to a terminal.
    fn is_interactive(&self) -> bool;

    /// Emits one status line.
    fn status(&self, message: &str);

    /// Emits one warning or error line.
    fn warning(&self, message: &str);

    /// Updates the in-place progress display.
    ///
    /// Non-interactive sinks ignore this call.
    fn progress(&self, downloaded: u64, total: Option<u64>);

    /// Ends the current progress display, if any.
    fn finish_progress(&self);
}

/// Sink writing status lines to stdout and warnings to stderr.
///
/// Every line is flushed as it is written, so output interleaves correctly
/// with child processes (pip, wget, ...) that share the same streams.
pub struct ConsoleSink {
    interactive: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    /// Creates a console sink with a fixed interactivity mode.
    #[must_use]
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            bar: Mutex::new(None),
        }
    }

    fn new_bar(total: Option<u64>) -> ProgressBar {
        match total {
            Some(len) if len > 0 => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(
                        "   Progress: {percent:>3}% ({bytes}/{total_bytes}) {bytes_per_sec}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            _ => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("   Progress: {bytes} {bytes_per_sec}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        }
    }
}

impl OutputSink for ConsoleSink {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn status(&self, message: &str) {
        let guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            bar.println(message);
            return;
        }
        drop(guard);
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{message}");
        let _ = stdout.flush();
    }

    fn warning(&self, message: &str) {
        let guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            bar.suspend(|| eprintln!("{message}"));
            return;
        }
        drop(guard);
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{message}");
        let _ = stderr.flush();
    }

    fn progress(&self, downloaded: u64, total: Option<u64>) {
        if !self.interactive {
            return;
        }
        let mut guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let bar = guard.get_or_insert_with(|| Self::new_bar(total));
        bar.set_position(downloaded);
    }

    fn finish_progress(&self) {
        let mut guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = guard.take() {
            bar.finish();
        }
    }
}

/// One captured output event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// A status line.
    Status(String),
    /// A warning line.
    Warning(String),
    /// A progress redraw.
    Progress {
        /// Bytes on disk so far.
        downloaded: u64,
        /// Expected total, when known.
        total: Option<u64>,
    },
    /// Progress display finished.
    ProgressFinished,
}

/// Sink that records events in memory instead of printing them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    interactive: bool,
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    /// Creates a recording sink that reports the given interactivity.
    #[must_use]
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Returns all status and warning lines, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Status(line) | SinkEvent::Warning(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Number of progress redraws recorded.
    #[must_use]
    pub fn progress_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SinkEvent::Progress { .. }))
            .count()
    }

    fn push(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

impl OutputSink for RecordingSink {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn status(&self, message: &str) {
        self.push(SinkEvent::Status(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(SinkEvent::Warning(message.to_string()));
    }

    fn progress(&self, downloaded: u64, total: Option<u64>) {
        if self.interactive {
            self.push(SinkEvent::Progress { downloaded, total });
        }
    }

    fn finish_progress(&self) {
        self.push(SinkEvent::ProgressFinished);
    }
}
