//! Versioned, directory-backed response cache
//!
//! Each named cache is a directory under the cache root. An entry is two
//! files named after the SHA-256 of the request key: `<hash>.json` holds the
//! metadata (original key, status, content type, stored-at) and `<hash>.body`
//! holds the raw bytes. Every cache name ends in the current [`CacheVersion`],
//! and [`ResourceCache::cleanup`] is the only eviction there is.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::net::{Response, ServedFrom};

/// Errors that can occur while reading or writing the resource cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cache root could not be created, caching is bypassed
    #[error("Cache storage is unavailable")]
    Unavailable,
}

/// Deployment version token embedded in every cache name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheVersion(String);

impl Default for CacheVersion {
    fn default() -> Self {
        Self("v1".to_string())
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CacheVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The next version: the trailing number is incremented (`v3` -> `v4`).
    /// A token without a trailing number restarts at `v1`.
    pub fn next(&self) -> Self {
        let digits_at = self
            .0
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        let (prefix, digits) = self.0.split_at(digits_at);
        match digits.parse::<u64>() {
            Ok(n) => Self(format!("{prefix}{}", n + 1)),
            Err(_) => Self("v1".to_string()),
        }
    }

    /// Name of the cache holding shell assets
    pub fn static_cache(&self) -> String {
        format!("static-{}", self.0)
    }

    /// Name of the cache holding product data and images
    pub fn dynamic_cache(&self) -> String {
        format!("dynamic-{}", self.0)
    }

    /// Whether a cache name belongs to this version
    pub fn owns(&self, cache_name: &str) -> bool {
        cache_name.ends_with(&format!("-{}", self.0))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    content_type: Option<String>,
    stored_at: DateTime<Utc>,
}

/// A response read back from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

/// Named, versioned store of responses
#[derive(Debug, Clone)]
pub struct ResourceCache {
    root: Option<PathBuf>,
    version: CacheVersion,
}

impl ResourceCache {
    /// Opens (creating if needed) a cache rooted at `root`
    ///
    /// If the directory cannot be created the cache comes up unavailable:
    /// lookups miss and stores fail, so callers bypass it transparently.
    pub fn new(root: PathBuf, version: CacheVersion) -> Self {
        match std::fs::create_dir_all(&root) {
            Ok(()) => Self {
                root: Some(root),
                version,
            },
            Err(e) => {
                warn!(path = %root.display(), error = %e, "Resource cache unavailable");
                Self::unavailable(version)
            }
        }
    }

    /// A cache with no backing storage
    pub fn unavailable(version: CacheVersion) -> Self {
        Self {
            root: None,
            version,
        }
    }

    pub fn is_available(&self) -> bool {
        self.root.is_some()
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    fn cache_dir(&self, cache_name: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(cache_name))
    }

    fn entry_stem(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Looks up `key` in the named cache
    pub async fn lookup(&self, cache_name: &str, key: &str) -> Option<CachedResponse> {
        let dir = self.cache_dir(cache_name)?;
        match read_entry(&dir, key).await {
            Ok(entry) => entry,
            Err(e) => {
                debug!(cache = cache_name, key, error = %e, "Unreadable cache entry");
                None
            }
        }
    }

    /// Looks up `key` in every cache, in cache name order
    pub async fn lookup_any(&self, key: &str) -> Option<CachedResponse> {
        for name in self.cache_names().await {
            if let Some(entry) = self.lookup(&name, key).await {
                return Some(entry);
            }
        }
        None
    }

    /// Stores `response` under `key`, replacing any previous entry
    pub async fn store(
        &self,
        cache_name: &str,
        key: &str,
        response: &Response,
    ) -> Result<(), CacheError> {
        let dir = self.cache_dir(cache_name).ok_or(CacheError::Unavailable)?;
        fs::create_dir_all(&dir).await?;

        let stem = Self::entry_stem(key);
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            stored_at: Utc::now(),
        };

        // Meta last: an entry only exists once its body is complete.
        fs::write(dir.join(format!("{stem}.body")), &response.body).await?;
        fs::write(
            dir.join(format!("{stem}.json")),
            serde_json::to_vec_pretty(&meta)?,
        )
        .await?;

        debug!(cache = cache_name, key, bytes = response.body.len(), "Stored response");
        Ok(())
    }

    /// Names of all existing caches, sorted
    pub async fn cache_names(&self) -> Vec<String> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let Ok(mut entries) = fs::read_dir(root).await else {
            return names;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_dir = entry
                .file_type()
                .await
                .map(|kind| kind.is_dir())
                .unwrap_or(false);
            if is_dir {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        names
    }

    /// Request keys stored in the named cache, sorted
    pub async fn keys(&self, cache_name: &str) -> Vec<String> {
        let Some(dir) = self.cache_dir(cache_name) else {
            return Vec::new();
        };
        let mut keys = Vec::new();
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            return keys;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Ok(bytes) = fs::read(&path).await {
                if let Ok(meta) = serde_json::from_slice::<EntryMeta>(&bytes) {
                    keys.push(meta.key);
                }
            }
        }
        keys.sort();
        keys
    }

    /// Deletes a named cache; returns whether it existed
    pub async fn delete(&self, cache_name: &str) -> Result<bool, CacheError> {
        let Some(dir) = self.cache_dir(cache_name) else {
            return Ok(false);
        };
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every cache not owned by the current version
    ///
    /// Returns the names that were deleted.
    pub async fn cleanup(&self) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in self.cache_names().await {
            if self.version.owns(&name) {
                continue;
            }
            if self.delete(&name).await? {
                info!(cache = %name, "Deleted outdated cache");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Deletes every cache regardless of version
    pub async fn clear(&self) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in self.cache_names().await {
            if self.delete(&name).await? {
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

async fn read_entry(dir: &Path, key: &str) -> Result<Option<CachedResponse>, CacheError> {
    let stem = ResourceCache::entry_stem(key);
    let meta_bytes = match fs::read(dir.join(format!("{stem}.json"))).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let meta: EntryMeta = serde_json::from_slice(&meta_bytes)?;
    if meta.key != key {
        return Ok(None);
    }
    let body = fs::read(dir.join(format!("{stem}.body"))).await?;
    Ok(Some(CachedResponse {
        response: Response {
            status: meta.status,
            content_type: meta.content_type,
            body,
            served_from: ServedFrom::Cache,
        },
        stored_at: meta.stored_at,
    }))
}
