use console::Term;
use tokio::sync::watch;

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The returned receiver flips to `true` on the first Ctrl+C; a second one
/// exits the process immediately.
pub(crate) fn setup_shutdown_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            // Keep the sender alive; a dropped sender reads as shutdown.
            std::future::pending::<()>().await;
        }

        let is_tty = Term::stderr().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current operations...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current operations");
        }

        tx.send_replace(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
        std::future::pending::<()>().await;
    });

    rx
}
