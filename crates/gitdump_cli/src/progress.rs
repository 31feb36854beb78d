//! Progress reporting for walks and webhook deliveries.
//!
//! - Interactive mode (TTY): one styled line per repository on stderr
//! - Logging mode (non-TTY): structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use gitdump::sync::{ProgressCallback, SyncProgress};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Styled status lines for a TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes, services).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        let term = Term::stderr();
        if term.is_term() {
            Self::Interactive(InteractiveReporter::new(term))
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the engine.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| {
            reporter.handle(event);
        })
    }

    /// Whether stderr is a terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive(_))
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable rendering of a wait.
pub(crate) fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_handles_seconds_minutes_and_hours() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::seconds(120)), "2m");
        assert_eq!(format_duration(chrono::Duration::seconds(125)), "2m 5s");
        assert_eq!(format_duration(chrono::Duration::seconds(3600)), "1h");
        assert_eq!(format_duration(chrono::Duration::seconds(3900)), "1h 5m");
    }

    #[test]
    fn test_logging_callback_accepts_every_event() {
        let reporter = Arc::new(ProgressReporter::Logging(LoggingReporter::new()));
        let callback = reporter.as_callback();

        callback(SyncProgress::RepositoryStarted {
            repository: "acme/widgets".into(),
        });
        callback(SyncProgress::CooledDown {
            wait: std::time::Duration::from_secs(90),
        });
        assert!(!reporter.is_interactive());
    }
}
