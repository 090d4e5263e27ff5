//! Status reporting boundary.
//!
//! The orchestrator never talks to a UI directly. It emits [`StatusEvent`]s
//! to a [`StatusReporter`] and, in interactive mode, blocks on an
//! [`AckSource`] before restarting the application.

mod ack;

pub use ack::{AckReceiver, AckResult, AckSender, AckSource, ConsolePrompt, ack_channel};

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Installer progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "percent", rename_all = "snake_case")]
pub enum Progress {
    /// Known completion, 0 to 100.
    Percent(u8),
    /// Work is happening but its extent is unknown.
    Indeterminate,
}

impl Progress {
    /// Progress clamped to 100%.
    #[must_use]
    pub fn percent(value: u8) -> Self {
        Self::Percent(value.min(100))
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Indeterminate => write!(f, "working"),
        }
    }
}

/// An event delivered to the status reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Installer progress tick.
    Progress {
        /// Current progress.
        progress: Progress,
    },
    /// The update completed and was recorded.
    Succeeded {
        /// Message for the user.
        message: String,
    },
    /// The update did not complete.
    Failed {
        /// Message for the user.
        message: String,
    },
}

impl StatusEvent {
    /// Whether this is a `succeeded` or `failed` event.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Receives status events. Implementations must not block for long.
pub trait StatusReporter: Send + Sync {
    /// Deliver one event.
    fn report(&self, event: StatusEvent);

    /// Report installer progress.
    fn progress(&self, progress: Progress) {
        self.report(StatusEvent::Progress { progress });
    }

    /// Report the terminal success status.
    fn succeeded(&self, message: &str) {
        self.report(StatusEvent::Succeeded {
            message: message.to_string(),
        });
    }

    /// Report the terminal failure status.
    fn failed(&self, message: &str) {
        self.report(StatusEvent::Failed {
            message: message.to_string(),
        });
    }
}

/// Human-readable lines on a writer (stderr by default).
pub struct ConsoleReporter<W: Write + Send = io::Stderr> {
    writer: Mutex<W>,
}

impl ConsoleReporter<io::Stderr> {
    /// Reporter writing to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    /// Reporter writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the reporter and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> StatusReporter for ConsoleReporter<W> {
    fn report(&self, event: StatusEvent) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let result = match &event {
            StatusEvent::Progress { progress } => writeln!(writer, "progress: {progress}"),
            StatusEvent::Succeeded { message } => writeln!(writer, "succeeded: {message}"),
            StatusEvent::Failed { message } => writeln!(writer, "failed: {message}"),
        };
        if let Err(e) = result.and_then(|()| writer.flush()) {
            tracing::debug!("Failed to write status line: {e}");
        }
    }
}

#[derive(Serialize)]
struct JsonlRecord<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a StatusEvent,
}

/// One JSON object per line, for a supervising process.
pub struct JsonlReporter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlReporter<W> {
    /// Reporter writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the reporter and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> StatusReporter for JsonlReporter<W> {
    fn report(&self, event: StatusEvent) {
        let record = JsonlRecord {
            timestamp: Utc::now(),
            event: &event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize status event: {e}");
                return;
            }
        };
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
            tracing::debug!("Failed to write status event: {e}");
        }
    }
}

/// Forwards every event to several reporters.
#[derive(Default)]
pub struct FanoutReporter {
    reporters: Vec<Box<dyn StatusReporter>>,
}

impl FanoutReporter {
    /// Empty fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reporter.
    #[must_use]
    pub fn with(mut self, reporter: impl StatusReporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl StatusReporter for FanoutReporter {
    fn report(&self, event: StatusEvent) {
        for reporter in &self.reporters {
            reporter.report(event.clone());
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingReporter {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// The `succeeded`/`failed` events received so far.
    #[must_use]
    pub fn terminal_events(&self) -> Vec<StatusEvent> {
        self.events()
            .into_iter()
            .filter(StatusEvent::is_terminal)
            .collect()
    }
}

impl StatusReporter for RecordingReporter {
    fn report(&self, event: StatusEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl<R: StatusReporter + ?Sized> StatusReporter for std::sync::Arc<R> {
    fn report(&self, event: StatusEvent) {
        (**self).report(event);
    }
}
