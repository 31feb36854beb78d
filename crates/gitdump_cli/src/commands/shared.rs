use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitdump::github::GitHubClient;
use gitdump::store::open_targets;
use gitdump::sync::{SyncEngine, SyncOptions};
use gitdump::{Cursor, CursorMode, KeyAlgorithm, TargetSpec};

use crate::config::Config;
use crate::progress::ProgressReporter;

/// Options shared by the commands that walk repositories.
#[derive(Debug, Clone, Default, clap::Args)]
pub(crate) struct SyncArgs {
    /// Repositories to walk, comma separated (default: all visible to the token)
    #[arg(short = 'r', long)]
    pub(crate) repositories: Option<String>,

    /// Storage target, repeatable; the first is authoritative
    /// (e.g. store=sqlite:db_name=dump.db)
    #[arg(short = 't', long = "target", value_name = "SPEC")]
    pub(crate) targets: Vec<String>,

    /// Directory holding the walk cursor (default from config or state dir)
    #[arg(short = 's', long)]
    pub(crate) status_path: Option<PathBuf>,

    /// Cursor semantics: cold-start or per-repository
    #[arg(long)]
    pub(crate) cursor_mode: Option<CursorMode>,

    /// Record key algorithm: sha1 or sha256
    #[arg(long)]
    pub(crate) key_algorithm: Option<KeyAlgorithm>,

    /// Concurrent target writes (default from config, 0 = CPU count)
    #[arg(short = 'c', long)]
    pub(crate) fanout_workers: Option<usize>,
}

/// Engine options: config file values overridden by CLI flags.
pub(crate) fn sync_options(config: &Config, args: &SyncArgs) -> SyncOptions {
    let mut options = config.sync_options();
    if let Some(list) = args.repositories.as_deref() {
        options.repositories = SyncOptions::parse_repositories(list);
    }
    if let Some(algorithm) = args.key_algorithm {
        options.key_algorithm = algorithm;
    }
    if let Some(workers) = args.fanout_workers {
        options.fanout_workers = workers;
    }
    options
}

/// Target specs from `--target` flags, else from the config.
pub(crate) fn target_specs(
    config: &Config,
    args: &SyncArgs,
) -> Result<Vec<TargetSpec>, Box<dyn Error>> {
    let specs = if args.targets.is_empty() {
        config.target_specs()
    } else {
        args.targets
            .iter()
            .map(|s| s.parse::<TargetSpec>())
            .collect::<Result<Vec<_>, _>>()?
    };

    if specs.is_empty() {
        return Err("No storage targets configured. Pass --target or add [[targets]] to the config.".into());
    }
    Ok(specs)
}

/// Path of a local SQLite database URL, without scheme or query.
pub(crate) fn sqlite_path(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != ":memory:").then(|| Path::new(path))
}

/// Ensure the directory of every SQLite target exists.
pub(crate) fn prepare_sqlite_dirs(specs: &[TargetSpec]) -> std::io::Result<()> {
    for spec in specs {
        let TargetSpec::Sqlite { url, .. } = spec else {
            continue;
        };
        let Some(db_path) = sqlite_path(url) else {
            continue;
        };

        if db_path.is_relative() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Build the GitHub client from the `[github]` section.
pub(crate) fn github_client(config: &Config) -> Result<GitHubClient, Box<dyn Error>> {
    if config.github.token.is_none() {
        tracing::warn!("No GitHub token configured, using the unauthenticated rate limit");
    }
    Ok(GitHubClient::with_options(
        config.github.token.as_deref(),
        &config.github.api_url,
        config.github.requests_per_second,
    )?)
}

/// Build an engine with its targets, cursor and progress reporter.
pub(crate) async fn build_engine(
    config: &Config,
    args: &SyncArgs,
    options: SyncOptions,
    reporter: &Arc<ProgressReporter>,
) -> Result<SyncEngine, Box<dyn Error>> {
    let specs = target_specs(config, args)?;
    prepare_sqlite_dirs(&specs)?;
    let targets = open_targets(&specs).await?;

    let client = Arc::new(github_client(config)?);
    let mut engine = SyncEngine::new(client, targets, options)?
        .with_progress(reporter.as_callback());

    let status_path = args.status_path.clone().or_else(|| config.status_path());
    if let Some(status_path) = status_path {
        let mode = args.cursor_mode.unwrap_or(config.sync.cursor_mode);
        engine = engine.with_cursor(Cursor::open(&status_path, mode)?);
    } else {
        tracing::warn!("No status directory available, walking without a cursor");
    }

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_path_strips_scheme_and_query() {
        assert_eq!(
            sqlite_path("sqlite:///var/lib/gitdump/dump.db?mode=rwc"),
            Some(Path::new("/var/lib/gitdump/dump.db"))
        );
        assert_eq!(sqlite_path("sqlite::memory:"), None);
        assert_eq!(sqlite_path("postgres://localhost/gitdump"), None);
    }

    #[test]
    fn test_prepare_sqlite_dirs_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested/state/dump.db");
        let specs = vec![
            TargetSpec::Sqlite {
                url: format!("sqlite://{}?mode=rwc", db.display()),
                table_name: "github_dump".into(),
            },
            TargetSpec::Memory {
                name: "memory".into(),
            },
        ];

        prepare_sqlite_dirs(&specs).unwrap();
        assert!(dir.path().join("nested/state").is_dir());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let config = Config::default();
        let args = SyncArgs {
            repositories: Some("acme/widgets".into()),
            key_algorithm: Some(KeyAlgorithm::Sha256),
            fanout_workers: Some(2),
            ..SyncArgs::default()
        };

        let options = sync_options(&config, &args);
        assert_eq!(options.repositories, Some(vec!["acme/widgets".to_string()]));
        assert_eq!(options.key_algorithm, KeyAlgorithm::Sha256);
        assert_eq!(options.fanout_workers, 2);
    }

    #[test]
    fn test_target_flags_replace_configured_targets() {
        let config = Config::default();
        let args = SyncArgs {
            targets: vec!["store=memory:name=scratch".into()],
            ..SyncArgs::default()
        };

        let specs = target_specs(&config, &args).unwrap();
        assert_eq!(
            specs,
            vec![TargetSpec::Memory {
                name: "scratch".into()
            }]
        );

        let bad = SyncArgs {
            targets: vec!["store=redis".into()],
            ..SyncArgs::default()
        };
        assert!(target_specs(&config, &bad).is_err());
    }
}
