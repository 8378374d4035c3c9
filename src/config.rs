//! Configuration for the product wall
//!
//! All tuning constants (layout geometry, rotation timing, cache routing) live
//! here instead of being hardcoded, and can be overridden from a JSON file.
//! Every section defaults, so a config file only needs the keys it changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheVersion;

/// Errors that can occur when loading or saving a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid config JSON
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Where relative resource paths (product documents, assets) are served from
    pub base_url: String,
    /// Size of one terminal cell in pixels, used to map the terminal to a viewport
    pub cell_px: CellSize,
    pub layout: LayoutConfig,
    pub rotation: RotationConfig,
    pub acquisition: AcquisitionConfig,
    pub worker: WorkerConfig,
    pub precache: PrecacheConfig,
    pub refresh: RefreshConfig,
    pub views: ViewsConfig,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            cell_px: CellSize::default(),
            layout: LayoutConfig::default(),
            rotation: RotationConfig::default(),
            acquisition: AcquisitionConfig::default(),
            worker: WorkerConfig::default(),
            precache: PrecacheConfig::default(),
            refresh: RefreshConfig::default(),
            views: ViewsConfig::default(),
        }
    }
}

impl WallConfig {
    /// Loads config from `path`, or returns defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes config to `path` as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Pixel size of one terminal cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CellSize {
    fn default() -> Self {
        Self {
            width: 10,
            height: 20,
        }
    }
}

/// Grid geometry for one screen orientation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationLayout {
    pub column_width: u32,
    pub gap: u32,
    pub min_columns: usize,
    pub max_columns: usize,
    /// Estimated item height as a multiple of the column width
    pub aspect_multiplier: f32,
    pub min_display: usize,
    pub max_display: usize,
}

impl OrientationLayout {
    /// Wider columns, fewer of them
    pub fn landscape() -> Self {
        Self {
            column_width: 300,
            gap: 8,
            min_columns: 3,
            max_columns: 6,
            aspect_multiplier: 1.0,
            min_display: 5,
            max_display: 60,
        }
    }

    /// Narrower columns and tighter gaps to fit more across
    pub fn portrait() -> Self {
        Self {
            column_width: 220,
            gap: 6,
            min_columns: 2,
            max_columns: 8,
            aspect_multiplier: 1.1,
            min_display: 5,
            max_display: 40,
        }
    }
}

/// Layout planner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub landscape: OrientationLayout,
    pub portrait: OrientationLayout,
    /// Total horizontal padding around the grid
    pub horizontal_padding: u32,
    /// Total vertical padding around the grid
    pub vertical_padding: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            landscape: OrientationLayout::landscape(),
            portrait: OrientationLayout::portrait(),
            horizontal_padding: 60,
            vertical_padding: 10,
        }
    }
}

/// Which slots the rotation engine may replace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationMode {
    /// Any slot outside the cooldown window
    Cooldown,
    /// Only slots that are currently off-screen
    OffscreenOnly,
}

/// Rotation engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub production_interval_ms: u64,
    pub development_interval_ms: u64,
    /// Rotations before a replaced slot is eligible again
    pub cooldown_period: usize,
    pub mode: RotationMode,
    /// Pool of aspect ratios assigned to new display items
    pub aspect_ratios: Vec<f32>,
    /// Rotations per cycle; defaults to the working-set size
    pub cycle_length: Option<usize>,
    /// Randomize the product order on initialization
    pub shuffle_on_start: bool,
    /// Pause between a shuffle and the restart of the rotation timer
    pub settle_delay_ms: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            production_interval_ms: 8_000,
            development_interval_ms: 2_000,
            cooldown_period: 3,
            mode: RotationMode::Cooldown,
            aspect_ratios: vec![0.95, 1.0, 1.05, 1.1, 1.15, 1.2],
            cycle_length: None,
            shuffle_on_start: false,
            settle_delay_ms: 1_000,
        }
    }
}

impl RotationConfig {
    /// Rotation timer interval for the given mode
    pub fn interval(&self, development: bool) -> Duration {
        if development {
            Duration::from_millis(self.development_interval_ms)
        } else {
            Duration::from_millis(self.production_interval_ms)
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Data acquisition pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Primary product document
    pub primary_url: String,
    /// Bundled fallback document, used when nothing else is available
    pub fallback_url: String,
    /// Maximum age at which stored products count as fresh
    pub freshness_hours: i64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            primary_url: "/data/products.json".to_string(),
            fallback_url: "/data/products-simple.json".to_string(),
            freshness_hours: 24,
        }
    }
}

impl AcquisitionConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_hours)
    }
}

/// Caching interceptor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// When false, every request passes straight through and caches are wiped
    pub enabled: bool,
    /// Version token embedded in every cache name
    pub version: CacheVersion,
    /// Activate right after install instead of waiting for `skip-waiting`
    pub auto_activate: bool,
    /// Paths pre-cached on install and served cache-first
    pub static_assets: Vec<String>,
    /// Requests whose URL contains this are product data (network-first)
    pub product_data_marker: String,
    /// Key under which injected product payloads are stored
    pub product_data_key: String,
    /// Key of the payload served when product data is unavailable
    pub fallback_key: String,
    /// Hosts whose responses are product images
    pub image_hosts: Vec<String>,
    /// File extensions treated as product images
    pub image_extensions: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version: CacheVersion::default(),
            auto_activate: true,
            static_assets: vec![
                "/fallback.json".to_string(),
                "/data/products-simple.json".to_string(),
            ],
            product_data_marker: "products.json".to_string(),
            product_data_key: "/data/products.json".to_string(),
            fallback_key: "/fallback.json".to_string(),
            image_hosts: vec!["cdn.shopify.com".to_string()],
            image_extensions: [".jpg", ".jpeg", ".png", ".webp", ".gif"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Bulk image pre-caching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecacheConfig {
    pub enabled: bool,
    /// Images fetched concurrently per batch
    pub concurrency: usize,
    /// Pause between batches
    pub pause_ms: u64,
    /// Cache every image of a product instead of only the primary one
    pub include_all_images: bool,
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 3,
            pause_ms: 100,
            include_all_images: false,
        }
    }
}

/// Background refresh settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_minutes: u64,
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            enabled: true,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// The ways the wall can present products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    /// Columns of tiles scrolling in alternating directions
    Marquee,
    /// The rotating grid
    Grid,
    /// One product at a time, full screen
    Slideshow,
}

impl ViewKind {
    pub fn name(self) -> &'static str {
        match self {
            ViewKind::Marquee => "Marquee",
            ViewKind::Grid => "Grid",
            ViewKind::Slideshow => "Slideshow",
        }
    }
}

/// One entry of the view cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub kind: ViewKind,
    /// Products handed to this view per distribution cycle
    pub products_per_view: usize,
    /// How long the view stays up before the next one when auto-switching
    pub switch_delay_ms: u64,
    /// Time per scroll or slide step; the grid rotates on its own timer instead
    #[serde(default)]
    pub step_ms: u64,
}

impl ViewSpec {
    pub fn switch_delay(&self) -> Duration {
        Duration::from_millis(self.switch_delay_ms)
    }

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

/// View cycling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Views in switching order
    pub order: Vec<ViewSpec>,
    pub auto_switch: bool,
    /// View shown first
    pub initial: ViewKind,
    /// Columns in the marquee view
    pub marquee_columns: usize,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            order: vec![
                ViewSpec {
                    kind: ViewKind::Marquee,
                    products_per_view: 20,
                    switch_delay_ms: 20_000,
                    step_ms: 1_000,
                },
                ViewSpec {
                    kind: ViewKind::Grid,
                    products_per_view: 15,
                    switch_delay_ms: 22_500,
                    step_ms: 0,
                },
                ViewSpec {
                    kind: ViewKind::Slideshow,
                    products_per_view: 15,
                    switch_delay_ms: 37_500,
                    step_ms: 2_500,
                },
            ],
            auto_switch: true,
            initial: ViewKind::Grid,
            marquee_columns: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_without_path_returns_defaults() {
        let config = WallConfig::load(None).unwrap();
        assert_eq!(config, WallConfig::default());
        assert_eq!(config.rotation.cooldown_period, 3);
        assert_eq!(config.acquisition.freshness_hours, 24);
        assert_eq!(config.precache.concurrency, 3);
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("wall.json");
        fs::write(
            &path,
            r#"{"rotation": {"cooldown_period": 5, "mode": "offscreen-only"}, "worker": {"version": "v7"}}"#,
        )
        .unwrap();

        let config = WallConfig::load(Some(&path)).unwrap();

        assert_eq!(config.rotation.cooldown_period, 5);
        assert_eq!(config.rotation.mode, RotationMode::OffscreenOnly);
        assert_eq!(config.rotation.production_interval_ms, 8_000);
        assert_eq!(config.worker.version.as_str(), "v7");
        assert!(config.worker.enabled);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ nope").unwrap();

        let err = WallConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = WallConfig::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_save_then_load_preserves_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("wall.json");
        let mut config = WallConfig::default();
        config.base_url = "https://wall.example/".to_string();
        config.rotation.shuffle_on_start = true;

        config.save(&path).unwrap();
        let loaded = WallConfig::load(Some(&path)).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rotation_interval_per_mode() {
        let config = RotationConfig::default();
        assert_eq!(config.interval(true), Duration::from_secs(2));
        assert_eq!(config.interval(false), Duration::from_secs(8));
    }

    #[test]
    fn test_views_section_overrides_cycle() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("wall.json");
        fs::write(
            &path,
            r#"{"views": {"auto_switch": false, "initial": "slideshow", "order": [
                {"kind": "grid", "products_per_view": 30, "switch_delay_ms": 60000},
                {"kind": "slideshow", "products_per_view": 5, "switch_delay_ms": 10000, "step_ms": 2000}
            ]}}"#,
        )
        .unwrap();

        let config = WallConfig::load(Some(&path)).unwrap();

        assert!(!config.views.auto_switch);
        assert_eq!(config.views.initial, ViewKind::Slideshow);
        assert_eq!(config.views.order.len(), 2);
        assert_eq!(config.views.order[0].step_ms, 0);
        assert_eq!(config.views.order[1].step(), Duration::from_secs(2));
        assert_eq!(config.views.marquee_columns, 4);
    }

    #[test]
    fn test_refresh_interval_in_minutes() {
        let config = RefreshConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(1800));
    }
}
