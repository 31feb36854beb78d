use std::sync::Mutex;

use console::{Term, style};
use gitdump::sync::{SyncProgress, WalkPass};

use super::format_duration;

#[derive(Debug, Default)]
struct WalkState {
    total: usize,
    done: usize,
    failures: usize,
}

/// Interactive reporter writing styled status lines to a terminal.
pub struct InteractiveReporter {
    term: Term,
    state: Mutex<WalkState>,
}

impl InteractiveReporter {
    pub fn new(term: Term) -> Self {
        Self {
            term,
            state: Mutex::new(WalkState::default()),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        let line = match event {
            SyncProgress::WalkStarted { pass, repositories } => {
                *state = WalkState {
                    total: repositories,
                    ..WalkState::default()
                };
                let label = match pass {
                    WalkPass::WarmUp => "Warm-up walk",
                    WalkPass::Full => "Full walk",
                };
                Some(format!(
                    "{} over {} repositories",
                    style(label).bold().cyan(),
                    repositories
                ))
            }

            SyncProgress::RepositoryComplete {
                repository,
                records,
            } => {
                state.done += 1;
                Some(format!(
                    "{} {} {}",
                    style(format!("[{}/{}]", state.done, state.total)).dim(),
                    repository,
                    style(format!("{records} records")).green()
                ))
            }

            SyncProgress::RepositorySkipped { repository } => {
                state.done += 1;
                Some(format!(
                    "{} {} {}",
                    style(format!("[{}/{}]", state.done, state.total)).dim(),
                    repository,
                    style("skipped").dim()
                ))
            }

            SyncProgress::CooledDown { wait } => Some(format!(
                "{} rate budget low, waited {}",
                style("⏸").yellow(),
                format_duration(chrono::Duration::seconds(wait.as_secs() as i64))
            )),

            SyncProgress::DeliveryFailed { target, error, .. } => {
                state.failures += 1;
                Some(format!(
                    "{} {}: {}",
                    style("✗").red(),
                    target,
                    style(error).red()
                ))
            }

            SyncProgress::EventIngested { record_id } => {
                Some(format!("{} event {}", style("←").cyan(), record_id))
            }

            SyncProgress::WalkComplete { stats, .. } => {
                let mut line = format!(
                    "{} {} records from {} issues ({} unchanged)",
                    style("✓").green().bold(),
                    stats.records,
                    stats.issues,
                    stats.skipped_issues
                );
                if state.failures > 0 {
                    line.push_str(&format!(", {} delivery failures", state.failures));
                }
                Some(line)
            }

            SyncProgress::WalkFailed { error } => {
                Some(format!("{} walk failed: {}", style("✗").red().bold(), error))
            }

            _ => None,
        };

        if let Some(line) = line {
            let _ = self.term.write_line(&line);
        }
    }
}
