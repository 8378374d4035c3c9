//! Command-line interface parsing for the product wall
//!
//! This module handles parsing of CLI arguments using clap. Without a
//! subcommand the wall is displayed; `sync` and `schedule` run the catalog
//! sync job, and `bump-version` invalidates every cache on the next start.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::cache::CacheVersion;
use crate::config::{ConfigError, WallConfig};
use crate::sync::{ScheduleConfig, SyncConfig};

/// Error types for CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// A command that rewrites the config was run without one
    #[error("No config file given; pass --config <FILE> or set PRODUCTWALL_CONFIG")]
    MissingConfigPath,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Product wall - rotating product display with offline caching
#[derive(Parser, Debug)]
#[command(name = "productwall")]
#[command(about = "Rotating product wall for TV displays, with offline caching and catalog sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// JSON config file; every key is optional
    #[arg(long, global = true, env = "PRODUCTWALL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Development mode: fast rotation, caching off, manual rotation with space
    #[arg(long, global = true)]
    pub dev: bool,

    /// Base URL the product documents are served from
    #[arg(long, global = true, env = "PRODUCTWALL_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the product wall (default)
    Display,

    /// Fetch the catalog once and write the static product documents
    Sync(SyncArgs),

    /// Run the sync on a fixed interval until interrupted
    Schedule {
        #[command(flatten)]
        sync: SyncArgs,

        /// Days between runs
        #[arg(long, default_value_t = 14)]
        interval_days: u64,

        /// Run once right away instead of waiting a full interval
        #[arg(long)]
        run_on_start: bool,
    },

    /// Increment the cache version in the config file
    ///
    /// Every cache written under the old version is deleted the next time
    /// the wall starts.
    BumpVersion,
}

/// Arguments shared by `sync` and `schedule`
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Store domain, e.g. my-shop.myshopify.com
    #[arg(long, env = "SHOPIFY_STORE_URL")]
    pub store_url: Option<String>,

    /// Admin API access token
    #[arg(long, env = "SHOPIFY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Public storefront domain used in product links
    #[arg(long, env = "SHOPIFY_PRODUCTION_URL", default_value = "stoffeya.at")]
    pub production_url: String,

    /// Directory for products.json and products-simple.json
    #[arg(long, default_value = "public/data")]
    pub output_dir: PathBuf,

    /// Where the fallback subset is written
    #[arg(long, default_value = "public/fallback.json")]
    pub fallback_path: PathBuf,

    /// Admin API version
    #[arg(long, default_value = "2023-10")]
    pub api_version: String,

    /// Number of products in the fallback subset
    #[arg(long, default_value_t = 12)]
    pub fallback_size: usize,
}

impl SyncArgs {
    pub fn to_config(&self) -> SyncConfig {
        SyncConfig {
            store_url: self.store_url.clone(),
            access_token: self.access_token.clone(),
            production_url: self.production_url.clone(),
            output_dir: self.output_dir.clone(),
            fallback_path: self.fallback_path.clone(),
            api_version: self.api_version.clone(),
            fallback_size: self.fallback_size,
        }
    }
}

/// Schedule settings from `schedule` arguments
pub fn schedule_config(interval_days: u64, run_on_start: bool) -> ScheduleConfig {
    ScheduleConfig::every_days(interval_days, run_on_start)
}

/// Loads the wall config and applies command-line overrides
///
/// Development mode switches the caching interceptor off, which also wipes
/// any caches left from production runs.
pub fn load_config(cli: &Cli) -> Result<WallConfig, CliError> {
    let mut config = WallConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if cli.dev {
        config.worker.enabled = false;
    }
    Ok(config)
}

/// Rewrites the config file with the next cache version
///
/// Returns the previous and the new version.
pub fn bump_version(path: Option<&Path>) -> Result<(CacheVersion, CacheVersion), CliError> {
    let path = path.ok_or(CliError::MissingConfigPath)?;
    let mut config = if path.exists() {
        WallConfig::load(Some(path))?
    } else {
        WallConfig::default()
    };
    let previous = config.worker.version.clone();
    config.worker.version = previous.next();
    config.save(path)?;
    Ok((previous, config.worker.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["productwall"]);
        assert!(cli.command.is_none());
        assert!(!cli.dev);
    }

    #[test]
    fn test_cli_parse_display_with_global_flags() {
        let cli = Cli::parse_from(["productwall", "display", "--dev", "--base-url", "http://tv.local/"]);
        assert!(matches!(cli.command, Some(Command::Display)));
        assert!(cli.dev);
        assert_eq!(cli.base_url.as_deref(), Some("http://tv.local/"));
    }

    #[test]
    fn test_cli_parse_sync_defaults() {
        let cli = Cli::parse_from([
            "productwall",
            "sync",
            "--store-url",
            "shop.myshopify.com",
            "--access-token",
            "secret",
        ]);
        let Some(Command::Sync(args)) = cli.command else {
            panic!("expected sync command");
        };
        let config = args.to_config();
        assert_eq!(config.store_url.as_deref(), Some("shop.myshopify.com"));
        assert_eq!(config.api_version, "2023-10");
        assert_eq!(config.output_dir, PathBuf::from("public/data"));
        assert_eq!(config.fallback_size, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_parse_schedule() {
        let cli = Cli::parse_from(["productwall", "schedule", "--interval-days", "7", "--run-on-start"]);
        let Some(Command::Schedule { interval_days, run_on_start, .. }) = cli.command else {
            panic!("expected schedule command");
        };
        assert_eq!(interval_days, 7);
        assert!(run_on_start);
        assert_eq!(
            schedule_config(interval_days, run_on_start).interval,
            std::time::Duration::from_secs(7 * 86_400)
        );
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let cli = Cli::parse_from(["productwall", "--dev", "--base-url", "http://tv.local/"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.base_url, "http://tv.local/");
        assert!(!config.worker.enabled);
    }

    #[test]
    fn test_bump_version_requires_path() {
        assert!(matches!(bump_version(None), Err(CliError::MissingConfigPath)));
    }

    #[test]
    fn test_bump_version_rewrites_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("wall.json");
        std::fs::write(&path, r#"{"worker": {"version": "v3"}, "base_url": "http://tv.local/"}"#).unwrap();

        let (previous, next) = bump_version(Some(&path)).unwrap();

        assert_eq!(previous.as_str(), "v3");
        assert_eq!(next.as_str(), "v4");
        let reloaded = WallConfig::load(Some(&path)).unwrap();
        assert_eq!(reloaded.worker.version.as_str(), "v4");
        assert_eq!(reloaded.base_url, "http://tv.local/");
    }
}
