//! gitdump CLI - mirror GitHub issue history into local and remote stores.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::limits::OutputFormat;
use crate::commands::run::RunArgs;
use crate::commands::shared::SyncArgs;

#[derive(Parser)]
#[command(name = "gitdump")]
#[command(version)]
#[command(about = "Mirror GitHub issue history into durable stores")]
#[command(
    long_about = "gitdump walks repositories, issues and comments through the GitHub API, \
turns every snapshot into a keyed record, and writes each record to all configured \
storage targets. Unchanged issues are skipped, and a webhook listener stores live \
events as they arrive."
)]
#[command(after_long_help = r#"EXAMPLES
    Mirror every visible repository into the default SQLite database:
        $ gitdump run

    Mirror two repositories into SQLite and Postgres, polling every 5 minutes:
        $ gitdump run -r acme/widgets,acme/gadgets -i 300 \
            -t store=sqlite:db_name=/var/lib/gitdump/dump.db \
            -t store=postgres:url=postgres://gitdump@localhost/gitdump

    Write to a local MongoDB as well as the default SQLite database:
        $ gitdump run -t store=sqlite:db_name=dump.db -t store=mongo:db_name=gitdump

    Walk once and exit:
        $ gitdump walk -r acme/widgets

    Show the remaining API budget:
        $ gitdump limits

CONFIGURATION
    gitdump reads configuration from:
      1. ~/.config/gitdump/config.toml (or $XDG_CONFIG_HOME/gitdump/config.toml)
      2. ./gitdump.toml
      3. Environment variables (GITDUMP_* prefix, e.g., GITDUMP_GITHUB__TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GITDUMP_GITHUB__TOKEN            GitHub personal access token (or GITHUB_TOKEN)
    GITDUMP_GITHUB__API_URL          API base URL (default: https://api.github.com)
    GITDUMP_SYNC__REPOSITORIES       Comma separated owner/name list
    GITDUMP_SYNC__STATUS_PATH        Cursor directory (default: ~/.local/state/gitdump)
    GITDUMP_SYNC__POLL_INTERVAL_SECS Seconds between full walks
    GITDUMP_LISTENER__PORT           Webhook listener port (default: 5000)
    RUST_LOG                         Log filter (default: gitdump=info,gitdump_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk continuously and accept webhook events until Ctrl+C
    Run(RunArgs),
    /// Walk every repository once and exit
    Walk(SyncArgs),
    /// Show current rate limit status
    Limits {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // On a terminal the progress reporter prints status lines, so only
    // warnings and errors go through the subscriber.
    let default_filter = if Term::stderr().is_term() {
        "gitdump=warn,gitdump_cli=warn"
    } else {
        "gitdump=info,gitdump_cli=info"
    };
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_filter),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    match cli.command {
        Commands::Run(args) => {
            let shutdown = shutdown::setup_shutdown_handler();
            commands::run::handle_run(args, &config, shutdown).await?;
        }
        Commands::Walk(args) => {
            let shutdown = shutdown::setup_shutdown_handler();
            commands::walk::handle_walk(args, &config, shutdown).await?;
        }
        Commands::Limits { output } => {
            commands::limits::handle_limits(output, &config).await?;
        }
    }

    Ok(())
}
