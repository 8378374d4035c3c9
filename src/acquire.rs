//! Product data acquisition
//!
//! Loads the product list for a session from the best available source, in
//! strict order: the primary network document, a fresh stored copy, a stale
//! stored copy, then the bundled fallback document. The first non-empty
//! result wins; failures of individual steps are logged and swallowed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::ProductStore;
use crate::config::AcquisitionConfig;
use crate::data::{parse_products, Product};
use crate::net::{FetchError, Fetcher, Request, ServedFrom};

/// Raised only when every source has been exhausted
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("No product data available")]
    NoDataAvailable,
}

/// Where a loaded product list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSource {
    Network,
    Cache,
    StaleCache,
    Fallback,
}

impl fmt::Display for ProductSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProductSource::Network => "network",
            ProductSource::Cache => "cache",
            ProductSource::StaleCache => "stale cache",
            ProductSource::Fallback => "fallback",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedProducts {
    pub products: Vec<Product>,
    pub source: ProductSource,
    /// When the data was fetched or stored, if known
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct ProductPipeline {
    fetcher: Arc<dyn Fetcher>,
    store: Option<ProductStore>,
    config: AcquisitionConfig,
}

impl ProductPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Option<ProductStore>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    pub fn store(&self) -> Option<&ProductStore> {
        self.store.as_ref()
    }

    async fn fetch_products(&self, request: Request) -> Result<(Vec<Product>, ServedFrom), FetchError> {
        let url = request.url.clone();
        let response = self.fetcher.fetch(&request).await?.error_for_status(&url)?;
        Ok((parse_products(&response.body)?, response.served_from))
    }

    /// Loads products from the first source that has any
    ///
    /// Only a document that really came over the network is persisted. A
    /// caching fetcher may answer the primary request from its own cache or
    /// with its fallback payload; the former ranks right after the stored
    /// copy, the latter after the bundled fallback document.
    pub async fn load(&self) -> Result<LoadedProducts, AcquireError> {
        let mut cached_response = None;
        let mut stand_in = None;

        // 1. Primary document, bypassing intermediate caches
        match self
            .fetch_products(Request::get(self.config.primary_url.as_str()).no_cache())
            .await
        {
            Ok((products, _)) if products.is_empty() => {
                warn!(url = %self.config.primary_url, "Primary product document is empty")
            }
            Ok((products, ServedFrom::Network)) => {
                let last_updated = self.persist(&products);
                info!(count = products.len(), "Loaded products from network");
                return Ok(LoadedProducts {
                    products,
                    source: ProductSource::Network,
                    last_updated: Some(last_updated.unwrap_or_else(Utc::now)),
                });
            }
            Ok((products, ServedFrom::Cache)) => {
                warn!(url = %self.config.primary_url, "Network unavailable, got cached response");
                cached_response = Some(products);
            }
            Ok((products, ServedFrom::Fallback)) => {
                warn!(url = %self.config.primary_url, "Network unavailable, got fallback payload");
                stand_in = Some(products);
            }
            Err(e) => warn!(url = %self.config.primary_url, error = %e, "Failed to fetch products"),
        }

        // 2 and 3. Stored copy, fresh first, stale if that's all there is
        match self.store.as_ref().and_then(ProductStore::read) {
            Some(cached) if !cached.products.is_empty() => {
                let source = if cached.is_expired {
                    warn!(cached_at = %cached.cached_at, "Using stale cached products");
                    ProductSource::StaleCache
                } else {
                    info!(count = cached.products.len(), "Loaded products from cache");
                    ProductSource::Cache
                };
                return Ok(LoadedProducts {
                    products: cached.products,
                    source,
                    last_updated: Some(cached.cached_at),
                });
            }
            Some(_) => warn!("Cached product list is empty"),
            None => warn!("No cached products"),
        }
        if let Some(products) = cached_response {
            info!(count = products.len(), "Loaded products from response cache");
            return Ok(LoadedProducts {
                products,
                source: ProductSource::Cache,
                last_updated: None,
            });
        }

        // 4. Bundled fallback
        match self
            .fetch_products(Request::get(self.config.fallback_url.as_str()))
            .await
        {
            Ok((products, _)) if !products.is_empty() => {
                info!(count = products.len(), "Loaded fallback products");
                return Ok(LoadedProducts {
                    products,
                    source: ProductSource::Fallback,
                    last_updated: None,
                });
            }
            Ok(_) => warn!(url = %self.config.fallback_url, "Fallback document is empty"),
            Err(e) => warn!(url = %self.config.fallback_url, error = %e, "Failed to fetch fallback"),
        }

        match stand_in {
            Some(products) => {
                info!(count = products.len(), "Using fallback payload");
                Ok(LoadedProducts {
                    products,
                    source: ProductSource::Fallback,
                    last_updated: None,
                })
            }
            None => Err(AcquireError::NoDataAvailable),
        }
    }

    fn persist(&self, products: &[Product]) -> Option<DateTime<Utc>> {
        let store = self.store.as_ref()?;
        match store.write(products) {
            Ok(at) => Some(at),
            Err(e) => {
                warn!(error = %e, "Failed to persist products");
                None
            }
        }
    }
}
