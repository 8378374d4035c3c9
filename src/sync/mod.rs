//! Catalog sync job
//!
//! Pulls every product from the commerce platform's admin API, derives the
//! fields the wall displays and writes the static documents the wall loads:
//! the full catalog with metadata, a bare product array, and a small
//! fallback subset.

mod client;
mod schedule;
mod transform;
mod writer;

pub use client::{next_page_info, AdminClient};
pub use schedule::{run_scheduler, ScheduleConfig, MAX_INTERVAL};
pub use transform::{build_metadata, enrich, fallback_subset, transform, FallbackProduct, SYNC_VERSION};
pub use writer::{write_outputs, SyncReport};

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required settings are missing
    #[error("Configuration errors: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// The API endpoint could not be built
    #[error("Invalid API URL '{0}'")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse API response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Settings for one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Store domain, e.g. `my-shop.myshopify.com`
    pub store_url: Option<String>,
    pub access_token: Option<String>,
    /// Public storefront domain used for product links
    pub production_url: String,
    /// Directory receiving `products.json` and `products-simple.json`
    pub output_dir: PathBuf,
    /// Where the fallback subset is written
    pub fallback_path: PathBuf,
    pub api_version: String,
    /// Number of products in the fallback subset
    pub fallback_size: usize,
}

impl SyncConfig {
    /// Checks that every required setting is present
    pub fn validate(&self) -> Result<(), SyncError> {
        let mut errors = Vec::new();
        if self.store_url.as_deref().map_or(true, str::is_empty) {
            errors.push("SHOPIFY_STORE_URL is required".to_string());
        }
        if self.access_token.as_deref().map_or(true, str::is_empty) {
            errors.push("SHOPIFY_ACCESS_TOKEN is required".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyncError::InvalidConfig(errors))
        }
    }

    /// Builds the admin API client for this configuration
    pub fn client(&self) -> Result<AdminClient, SyncError> {
        self.validate()?;
        let store = self.store_url.as_deref().unwrap_or_default();
        let token = self.access_token.as_deref().unwrap_or_default();
        AdminClient::new(store, &self.api_version, token)
    }
}

/// Runs one complete sync against the configured store
pub async fn run_sync(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let client = config.client()?;
    sync_with_client(&client, config).await
}

/// Runs one sync using an existing client
pub async fn sync_with_client(
    client: &AdminClient,
    config: &SyncConfig,
) -> Result<SyncReport, SyncError> {
    let started = Utc::now();
    info!(store = ?config.store_url, "Starting product sync");

    let fetched = client.fetch_all().await?;
    let fetched_count = fetched.len();
    let products = transform(fetched, &config.production_url);

    let metadata = build_metadata(
        &products,
        config.store_url.as_deref().unwrap_or_default(),
        Utc::now(),
    );
    write_outputs(
        &products,
        &metadata,
        &config.output_dir,
        &config.fallback_path,
        config.fallback_size,
    )?;

    let report = SyncReport::new(&products, fetched_count);
    report.log();
    let elapsed = Utc::now() - started;
    info!(
        products = products.len(),
        seconds = elapsed.num_milliseconds() as f64 / 1000.0,
        "Sync completed"
    );
    Ok(report)
}
