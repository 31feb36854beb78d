use std::error::Error;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use console::style;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use gitdump::platform::{IssueTracker, RateLimitInfo};

use crate::commands::shared::github_client;
use crate::config::Config;
use crate::progress::format_duration;

/// Output format for rate limit display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Show the core rate limit of the configured token.
pub(crate) async fn handle_limits(
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let client = github_client(config)?;
    let info = client.get_rate_limit().await?;
    let threshold = config.sync.budget_threshold;
    RateLimitDisplay::from_info(&info, threshold, Utc::now()).print(output)?;
    Ok(())
}

/// Rate limit information for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct RateLimitDisplay {
    #[tabled(rename = "Limit")]
    pub limit: usize,
    #[tabled(rename = "Used")]
    pub used: usize,
    #[tabled(rename = "Remaining")]
    pub remaining: usize,
    #[tabled(rename = "Usage %")]
    pub usage_percent: String,
    #[tabled(rename = "Resets At")]
    pub reset_at: String,
    #[tabled(rename = "Resets In")]
    pub reset_in: String,
    /// Whether a walk would cool down before its next call.
    #[tabled(rename = "Cooldown")]
    pub cooldown: bool,
}

impl RateLimitDisplay {
    pub(crate) fn from_info(info: &RateLimitInfo, threshold: usize, now: DateTime<Utc>) -> Self {
        let used = info.limit.saturating_sub(info.remaining);
        let usage_percent = if info.limit > 0 {
            (used as f64 / info.limit as f64) * 100.0
        } else {
            0.0
        };
        let reset_duration = info.reset_at.signed_duration_since(now);
        let reset_in = if reset_duration.num_seconds() > 0 {
            format_duration(reset_duration)
        } else {
            "now".to_string()
        };

        Self {
            limit: info.limit,
            used,
            remaining: info.remaining,
            usage_percent: format!("{:.1}%", usage_percent),
            reset_at: info.reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            reset_in,
            cooldown: info.remaining > 0 && info.remaining < threshold,
        }
    }

    pub(crate) fn table(&self) -> Table {
        let mut table = Table::new([self]);
        table.with(Style::rounded());
        table
    }

    pub(crate) fn print(&self, format: OutputFormat) -> serde_json::Result<()> {
        match format {
            OutputFormat::Table => {
                println!("{}", self.table());
                if self.cooldown {
                    println!(
                        "{}",
                        style("Budget below threshold: the next walk will cool down").yellow()
                    );
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(self)?);
            }
        }
        Ok(())
    }
}
