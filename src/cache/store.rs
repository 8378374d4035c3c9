//! Local persistent product cache
//!
//! Provides a `ProductStore` that keeps the last loaded product list on disk
//! under two fixed keys: the payload and a separate freshness timestamp. It is
//! the data source of last resort before the bundled fallback.

use chrono::{DateTime, Duration, TimeZone, Utc};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::Product;

/// Key of the stored product payload
pub const PRODUCTS_KEY: &str = "shopify-products-cache";

/// Key of the stored freshness timestamp (epoch milliseconds)
pub const TIMESTAMP_KEY: &str = "shopify-products-cache-timestamp";

/// Errors that can occur when writing the product store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write product store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize products: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of reading the store, including freshness
#[derive(Debug)]
pub struct CachedProducts {
    pub products: Vec<Product>,
    /// When the products were stored
    pub cached_at: DateTime<Utc>,
    /// Whether the entry is older than the freshness window
    pub is_expired: bool,
}

/// Reads and writes the persisted product list
///
/// Stored under an XDG-compliant data directory (`~/.local/share/productwall/`
/// on Linux). Expired entries are still returned, flagged with
/// `is_expired = true`, so callers can prefer availability over freshness.
#[derive(Debug, Clone)]
pub struct ProductStore {
    dir: PathBuf,
    freshness: Duration,
}

impl ProductStore {
    /// Creates a store in the platform data directory
    ///
    /// Returns `None` if no data directory can be determined (e.g. no home directory).
    pub fn new(freshness: Duration) -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "productwall")?;
        Some(Self::with_dir(project_dirs.data_dir().to_path_buf(), freshness))
    }

    /// Creates a store in a custom directory
    pub fn with_dir(dir: PathBuf, freshness: Duration) -> Self {
        Self { dir, freshness }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Persists `products` stamped with the current time
    pub fn write(&self, products: &[Product]) -> Result<DateTime<Utc>, StoreError> {
        let now = Utc::now();
        self.write_at(products, now)?;
        Ok(now)
    }

    /// Persists `products` stamped with an explicit time
    ///
    /// The timestamp is dropped first and written last, each key lands via a
    /// rename, so an interrupted write leaves no entry rather than a payload
    /// paired with an older timestamp.
    pub fn write_at(&self, products: &[Product], at: DateTime<Utc>) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(products)?;
        fs::create_dir_all(&self.dir)?;
        remove_if_present(&self.key_path(TIMESTAMP_KEY))?;
        self.replace_key(PRODUCTS_KEY, &payload)?;
        self.replace_key(TIMESTAMP_KEY, at.timestamp_millis().to_string().as_bytes())?;
        Ok(())
    }

    fn replace_key(&self, key: &str, contents: &[u8]) -> Result<(), StoreError> {
        let temp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&temp, contents)?;
        fs::rename(&temp, self.key_path(key))?;
        Ok(())
    }

    /// Reads the stored products
    ///
    /// Returns `None` if either key is missing or cannot be parsed; a malformed
    /// payload counts as no payload.
    pub fn read(&self) -> Option<CachedProducts> {
        let payload = fs::read(self.key_path(PRODUCTS_KEY)).ok()?;
        let stamp = fs::read_to_string(self.key_path(TIMESTAMP_KEY)).ok()?;

        let products: Vec<Product> = serde_json::from_slice(&payload).ok()?;
        let millis: i64 = stamp.trim().parse().ok()?;
        let cached_at = Utc.timestamp_millis_opt(millis).single()?;

        Some(CachedProducts {
            products,
            cached_at,
            is_expired: Utc::now() - cached_at >= self.freshness,
        })
    }

    /// Whether a non-expired entry exists
    pub fn is_fresh(&self) -> bool {
        self.read().is_some_and(|cached| !cached.is_expired)
    }

    /// Removes both keys
    pub fn clear(&self) -> Result<(), StoreError> {
        for key in [TIMESTAMP_KEY, PRODUCTS_KEY] {
            remove_if_present(&self.key_path(key))?;
        }
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (ProductStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = ProductStore::with_dir(temp_dir.path().to_path_buf(), Duration::hours(24));
        (store, temp_dir)
    }

    fn sample_products() -> Vec<Product> {
        vec![Product::new(1, "Mug"), Product::new(2, "Tote")]
    }

    #[test]
    fn test_write_creates_both_keys() {
        let (store, temp_dir) = create_test_store();

        store.write(&sample_products()).expect("Write should succeed");

        assert!(temp_dir.path().join("shopify-products-cache.json").exists());
        let stamp =
            fs::read_to_string(temp_dir.path().join("shopify-products-cache-timestamp.json"))
                .expect("Should read timestamp");
        assert!(stamp.parse::<i64>().is_ok(), "Timestamp should be epoch millis");
    }

    #[test]
    fn test_read_returns_none_when_empty() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.read().is_none());
        assert!(!store.is_fresh());
    }

    #[test]
    fn test_read_returns_fresh_products() {
        let (store, _temp_dir) = create_test_store();
        store.write(&sample_products()).expect("Write should succeed");

        let cached = store.read().expect("Should read products");

        assert_eq!(cached.products, sample_products());
        assert!(!cached.is_expired);
        assert!(store.is_fresh());
    }

    #[test]
    fn test_read_flags_entries_outside_freshness_window() {
        let (store, _temp_dir) = create_test_store();
        let stamped = Utc::now() - Duration::hours(25);
        store.write_at(&sample_products(), stamped).expect("Write should succeed");

        let cached = store.read().expect("Stale entries are still returned");

        assert!(cached.is_expired);
        assert_eq!(cached.cached_at.timestamp_millis(), stamped.timestamp_millis());
        assert!(!store.is_fresh());
    }

    #[test]
    fn test_malformed_payload_counts_as_absent() {
        let (store, temp_dir) = create_test_store();
        store.write(&sample_products()).expect("Write should succeed");
        fs::write(temp_dir.path().join("shopify-products-cache.json"), "not json").unwrap();

        assert!(store.read().is_none());
    }

    #[test]
    fn test_malformed_timestamp_counts_as_absent() {
        let (store, temp_dir) = create_test_store();
        store.write(&sample_products()).expect("Write should succeed");
        fs::write(
            temp_dir.path().join("shopify-products-cache-timestamp.json"),
            "yesterday",
        )
        .unwrap();

        assert!(store.read().is_none());
    }

    #[test]
    fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested = temp_dir.path().join("nested").join("store");
        let store = ProductStore::with_dir(nested.clone(), Duration::hours(24));

        store.write(&sample_products()).expect("Write should succeed");

        assert!(nested.join("shopify-products-cache.json").exists());
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (store, temp_dir) = create_test_store();
        store.write(&sample_products()).expect("Write should succeed");
        store.write(&[Product::new(3, "Cap")]).expect("Rewrite should succeed");

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
        assert_eq!(store.read().unwrap().products, vec![Product::new(3, "Cap")]);
    }

    #[test]
    fn test_interrupted_write_never_pairs_new_payload_with_old_timestamp() {
        let (store, temp_dir) = create_test_store();
        let old_stamp = Utc::now() - Duration::hours(30);
        store.write_at(&sample_products(), old_stamp).expect("Write should succeed");
        // A directory in the temp file's place makes the payload write fail.
        fs::create_dir(temp_dir.path().join("shopify-products-cache.json.tmp")).unwrap();

        let result = store.write(&[Product::new(3, "Cap")]);

        assert!(result.is_err());
        assert!(store.read().is_none(), "No entry rather than a mismatched one");
    }

    #[test]
    fn test_clear_removes_entry() {
        let (store, _temp_dir) = create_test_store();
        store.write(&sample_products()).expect("Write should succeed");

        store.clear().expect("Clear should succeed");
        assert!(store.read().is_none());
        store.clear().expect("Clearing twice is fine");
    }
}
