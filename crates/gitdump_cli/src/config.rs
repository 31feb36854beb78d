//! Configuration file support for gitdump.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `GITDUMP_`, sections separated by a
//!    double underscore, e.g. `GITDUMP_GITHUB__TOKEN`, `GITDUMP_LISTENER__PORT`)
//! 3. Local config file (./gitdump.toml)
//! 4. XDG config file (~/.config/gitdump/config.toml)
//! 5. Built-in defaults
//!
//! Without configured targets, records go to a SQLite database in the XDG
//! state directory, which also holds the walk cursor.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or GITDUMP_GITHUB__TOKEN / GITHUB_TOKEN
//! requests_per_second = 10
//!
//! [sync]
//! repositories = "acme/widgets,acme/gadgets"  # default: every visible repository
//! cursor_mode = "cold-start"                  # or "per-repository"
//! key_algorithm = "sha1"
//! poll_interval_secs = 300
//!
//! [listener]
//! host = "0.0.0.0"
//! port = 5000
//!
//! [[targets]]
//! store = "sqlite"
//! db_name = "/var/lib/gitdump/dump.db"
//!
//! [[targets]]
//! store = "postgres"
//! url = "postgres://gitdump@localhost/gitdump"
//!
//! [[targets]]
//! store = "mongo"
//! db_name = "gitdump"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use gitdump::github::DEFAULT_API_URL;
use gitdump::platform::rate_limits::GITHUB_DEFAULT_RPS;
use gitdump::platform::{DEFAULT_BUDGET_THRESHOLD, DEFAULT_COOLDOWN_MARGIN};
use gitdump::server::DEFAULT_PORT;
use gitdump::sync::{DEFAULT_ERROR_DELAY, SyncOptions};
use gitdump::{CursorMode, KeyAlgorithm, TargetSpec};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub sync: SyncConfig,
    pub listener: ListenerConfig,
    /// Storage targets; the first one is authoritative for change detection.
    pub targets: Vec<TargetSpec>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API token. Falls back to the `GITHUB_TOKEN` environment variable.
    pub token: Option<String>,
    /// API base URL, for GitHub Enterprise.
    pub api_url: String,
    /// Client-side request pacing.
    pub requests_per_second: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            requests_per_second: GITHUB_DEFAULT_RPS,
        }
    }
}

/// Walk and polling options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Comma separated `owner/name` list.
    pub repositories: Option<String>,
    /// Directory holding the cursor file.
    pub status_path: Option<PathBuf>,
    pub cursor_mode: CursorMode,
    pub key_algorithm: KeyAlgorithm,
    /// Pause between full walks.
    pub poll_interval_secs: u64,
    /// Pause after a failed walk.
    pub error_delay_secs: u64,
    pub budget_threshold: usize,
    pub cooldown_margin_secs: u64,
    /// Concurrent target writes (0 = available parallelism).
    pub fanout_workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repositories: None,
            status_path: None,
            cursor_mode: CursorMode::default(),
            key_algorithm: KeyAlgorithm::default(),
            poll_interval_secs: 0,
            error_delay_secs: DEFAULT_ERROR_DELAY.as_secs(),
            budget_threshold: DEFAULT_BUDGET_THRESHOLD,
            cooldown_margin_secs: DEFAULT_COOLDOWN_MARGIN.as_secs(),
            fanout_workers: 0,
        }
    }
}

/// Webhook listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// A broken source is logged and the built-in defaults are used instead.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("gitdump.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./gitdump.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // GITDUMP_SYNC__POLL_INTERVAL_SECS -> sync.poll_interval_secs
        builder = builder.add_source(
            Environment::with_prefix("GITDUMP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config = match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        };

        if config.github.token.is_none() {
            config.github.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        }
        config
    }

    /// Engine options derived from the `[sync]` section.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            repositories: self
                .sync
                .repositories
                .as_deref()
                .and_then(SyncOptions::parse_repositories),
            key_algorithm: self.sync.key_algorithm,
            poll_interval: Duration::from_secs(self.sync.poll_interval_secs),
            error_delay: Duration::from_secs(self.sync.error_delay_secs),
            budget_threshold: self.sync.budget_threshold,
            cooldown_margin: Duration::from_secs(self.sync.cooldown_margin_secs),
            fanout_workers: self.sync.fanout_workers,
        }
    }

    /// Configured targets, or a SQLite database in the state directory.
    pub fn target_specs(&self) -> Vec<TargetSpec> {
        if !self.targets.is_empty() {
            return self.targets.clone();
        }
        Self::default_state_dir()
            .map(|dir| {
                vec![TargetSpec::Sqlite {
                    url: format!("sqlite://{}?mode=rwc", dir.join("gitdump.db").display()),
                    table_name: gitdump::store::DEFAULT_TABLE_NAME.to_string(),
                }]
            })
            .unwrap_or_default()
    }

    /// Directory for the cursor file.
    pub fn status_path(&self) -> Option<PathBuf> {
        self.sync
            .status_path
            .clone()
            .or_else(Self::default_state_dir)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gitdump").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/gitdump` or `~/.local/state/gitdump`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gitdump").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
