use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use gitdump::server;

use crate::commands::shared::{SyncArgs, build_engine, sync_options};
use crate::config::Config;
use crate::progress::ProgressReporter;

/// Options for the long-running mirror.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub(crate) sync: SyncArgs,

    /// Webhook listener address (default from config or 0.0.0.0)
    #[arg(short = 'H', long)]
    pub(crate) host: Option<String>,

    /// Webhook listener port (default from config or 5000)
    #[arg(short = 'p', long)]
    pub(crate) port: Option<u16>,

    /// Seconds between full walks (default from config or 0)
    #[arg(short = 'i', long)]
    pub(crate) poll_interval: Option<u64>,

    /// Walk only; don't accept webhook events
    #[arg(long)]
    pub(crate) no_listener: bool,
}

/// Run the polling loop and the webhook listener until shutdown.
pub(crate) async fn handle_run(
    args: RunArgs,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn Error>> {
    let reporter = Arc::new(ProgressReporter::new());
    let mut options = sync_options(config, &args.sync);
    if let Some(secs) = args.poll_interval {
        options.poll_interval = Duration::from_secs(secs);
    }
    let engine = Arc::new(build_engine(config, &args.sync, options, &reporter).await?);

    let listener = if args.no_listener {
        None
    } else {
        let host = args.host.as_deref().unwrap_or(&config.listener.host);
        let port = args.port.unwrap_or(config.listener.port);
        Some(server::bind(host, port).await?)
    };

    let server_task = listener.map(|listener| {
        tokio::spawn(server::serve(
            listener,
            Arc::clone(&engine),
            shutdown.clone(),
        ))
    });

    engine.start(shutdown).await;

    if let Some(task) = server_task {
        match task.await {
            Ok(result) => result?,
            Err(e) => return Err(format!("Webhook listener task failed: {e}").into()),
        }
    }

    Ok(())
}
