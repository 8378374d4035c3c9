//! Request interceptor serving reads from the resource cache
//!
//! The interceptor sits between the app and the network as just another
//! [`Fetcher`]. Requests are routed by what they target: product data goes
//! network-first, shell assets and product images go cache-first, anything
//! else passes straight through. It only intercepts once its cache version has
//! been activated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cache::resource::{CacheError, CacheVersion, ResourceCache};
use crate::config::WorkerConfig;
use crate::data::Product;
use crate::net::{FetchError, Fetcher, Method, Request, Response, ServedFrom};

/// Lifecycle of a cache version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Static assets are being pre-cached
    Installing,
    /// Installed, waiting to be activated
    Waiting,
    /// Intercepting requests
    Active,
    /// Caching switched off, every request passes through
    Disabled,
}

pub struct Interceptor {
    cache: ResourceCache,
    network: Arc<dyn Fetcher>,
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    image_preloading_disabled: AtomicBool,
}

impl Interceptor {
    pub fn new(cache: ResourceCache, network: Arc<dyn Fetcher>, config: WorkerConfig) -> Self {
        Self {
            cache,
            network,
            config,
            state: Mutex::new(WorkerState::Installing),
            image_preloading_disabled: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn version(&self) -> &CacheVersion {
        self.cache.version()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn network(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.network)
    }

    pub fn image_preloading_disabled(&self) -> bool {
        self.image_preloading_disabled.load(Ordering::Relaxed)
    }

    pub fn set_image_preloading_disabled(&self, disabled: bool) {
        self.image_preloading_disabled.store(disabled, Ordering::Relaxed);
    }

    fn is_product_data(&self, request: &Request) -> bool {
        request.url.contains(&self.config.product_data_marker)
    }

    fn is_static_asset(&self, request: &Request) -> bool {
        let path = request.path();
        self.config.static_assets.iter().any(|asset| *asset == path)
    }

    fn is_image(&self, request: &Request) -> bool {
        if let Some(host) = request.host() {
            if self.config.image_hosts.iter().any(|h| *h == host) {
                return true;
            }
        }
        let path = request.path().to_ascii_lowercase();
        self.config
            .image_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Serves from `cache_name` when possible, else fetches and stores
    pub async fn cache_first(
        &self,
        request: &Request,
        cache_name: &str,
    ) -> Result<Response, FetchError> {
        if let Some(hit) = self.cache.lookup(cache_name, request.key()).await {
            debug!(cache = cache_name, key = request.key(), "Cache hit");
            return Ok(hit.response);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_best_effort(cache_name, request.key(), &response)
                        .await;
                }
                Ok(response)
            }
            Err(e) => self.fallback(request, e).await,
        }
    }

    /// Fetches first and refreshes `cache_name`, falling back to the cache
    pub async fn network_first(
        &self,
        request: &Request,
        cache_name: &str,
    ) -> Result<Response, FetchError> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_best_effort(cache_name, request.key(), &response)
                        .await;
                }
                Ok(response)
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Network failed, trying cache");
                if let Some(hit) = self.cache.lookup(cache_name, request.key()).await {
                    return Ok(hit.response);
                }
                self.fallback(request, e).await
            }
        }
    }

    /// The bundled fallback payload for product data, otherwise `error`
    async fn fallback(&self, request: &Request, error: FetchError) -> Result<Response, FetchError> {
        if self.is_product_data(request) {
            if let Some(hit) = self.cache.lookup_any(&self.config.fallback_key).await {
                info!(url = %request.url, "Serving fallback payload");
                return Ok(hit.response.tagged(ServedFrom::Fallback));
            }
        }
        Err(error)
    }

    async fn store_best_effort(&self, cache_name: &str, key: &str, response: &Response) {
        if let Err(e) = self.cache.store(cache_name, key, response).await {
            match e {
                CacheError::Unavailable => debug!(key, "Cache unavailable, not storing"),
                e => warn!(cache = cache_name, key, error = %e, "Failed to store response"),
            }
        }
    }

    /// Pre-caches the static assets and moves to `Waiting`
    ///
    /// With `auto_activate` the new version is activated right away. A
    /// disabled interceptor wipes every cache instead and stays disabled.
    pub async fn install(&self) {
        if !self.config.enabled {
            match self.cache.clear().await {
                Ok(deleted) if !deleted.is_empty() => {
                    info!(count = deleted.len(), "Caching disabled, deleted all caches")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to delete caches"),
            }
            self.set_state(WorkerState::Disabled);
            return;
        }

        self.set_state(WorkerState::Installing);
        let static_cache = self.version().static_cache();
        for asset in &self.config.static_assets {
            let request = Request::get(asset.as_str());
            match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    self.store_best_effort(&static_cache, request.key(), &response)
                        .await;
                }
                Ok(response) => {
                    warn!(asset = %asset, status = response.status, "Static asset not cached")
                }
                Err(e) => warn!(asset = %asset, error = %e, "Static asset not cached"),
            }
        }
        info!(version = %self.version(), "Cache version installed");
        self.set_state(WorkerState::Waiting);

        if self.config.auto_activate {
            self.activate().await;
        }
    }

    /// Deletes caches of other versions and starts intercepting
    ///
    /// Returns the names of the deleted caches.
    pub async fn activate(&self) -> Vec<String> {
        if self.state() == WorkerState::Disabled {
            return Vec::new();
        }
        let deleted = match self.cache.cleanup().await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(error = %e, "Cache cleanup failed");
                Vec::new()
            }
        };
        self.set_state(WorkerState::Active);
        info!(version = %self.version(), deleted = deleted.len(), "Cache version active");
        deleted
    }

    /// Activates a waiting version immediately; no-op in any other state
    pub async fn skip_waiting(&self) -> bool {
        if self.state() != WorkerState::Waiting {
            return false;
        }
        self.activate().await;
        true
    }

    /// Stores a product payload in the dynamic cache under the product data key
    pub async fn cache_products(&self, products: &[Product]) -> Result<(), CacheError> {
        let body = serde_json::to_vec(products)?;
        self.cache
            .store(
                &self.version().dynamic_cache(),
                &self.config.product_data_key,
                &Response::json_body(body),
            )
            .await?;
        info!(count = products.len(), "Cached product payload");
        Ok(())
    }

    /// Deletes every cache
    pub async fn clear_all(&self) -> Result<Vec<String>, CacheError> {
        let deleted = self.cache.clear().await?;
        info!(count = deleted.len(), "Cleared all caches");
        Ok(deleted)
    }
}

#[async_trait]
impl Fetcher for Interceptor {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if request.method != Method::Get || self.state() != WorkerState::Active {
            return self.network.fetch(request).await;
        }

        let version = self.version();
        if self.is_product_data(request) {
            self.network_first(request, &version.dynamic_cache()).await
        } else if self.is_static_asset(request) {
            self.cache_first(request, &version.static_cache()).await
        } else if self.is_image(request) {
            self.cache_first(request, &version.dynamic_cache()).await
        } else {
            self.network.fetch(request).await
        }
    }
}
