use std::error::Error;
use std::sync::Arc;

use console::{Term, style};
use tokio::sync::watch;

use gitdump::sync::WalkStats;

use crate::commands::shared::{SyncArgs, build_engine, sync_options};
use crate::config::Config;
use crate::progress::ProgressReporter;

/// Walk every repository once and exit.
pub(crate) async fn handle_walk(
    args: SyncArgs,
    config: &Config,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn Error>> {
    let reporter = Arc::new(ProgressReporter::new());
    let options = sync_options(config, &args);
    let engine = build_engine(config, &args, options, &reporter).await?;

    let stats = tokio::select! {
        result = engine.walk() => result?,
        _ = shutdown.wait_for(|stop| *stop) => {
            tracing::warn!("Walk interrupted");
            return Ok(());
        }
    };

    if !reporter.is_interactive() {
        return Ok(());
    }
    let _ = Term::stdout().write_line(&summary(&stats));
    Ok(())
}

fn summary(stats: &WalkStats) -> String {
    format!(
        "{} {} repositories, {} issues ({} unchanged), {} comments, {} records",
        style("Done:").bold(),
        stats.repositories,
        stats.issues,
        stats.skipped_issues,
        stats.comments,
        stats.records
    )
}
