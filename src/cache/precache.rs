//! Bulk image pre-caching
//!
//! Images are fetched in small concurrent batches with a pause between
//! batches, so a large catalog doesn't saturate the network or the cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::cache::resource::ResourceCache;
use crate::config::PrecacheConfig;
use crate::data::Product;
use crate::net::{Fetcher, Request};

/// Progress of a pre-caching run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrecacheStatus {
    pub total: usize,
    pub cached: usize,
    pub failed: usize,
    pub percentage: u8,
    pub is_complete: bool,
}

impl PrecacheStatus {
    fn new(total: usize, cached: usize, failed: usize) -> Self {
        let done = cached + failed;
        let percentage = if total == 0 {
            100
        } else {
            ((done * 100) / total).min(100) as u8
        };
        Self {
            total,
            cached,
            failed,
            percentage,
            is_complete: done >= total,
        }
    }
}

/// Warms the dynamic cache with product images
#[derive(Clone)]
pub struct ImagePrecacher {
    cache: ResourceCache,
    network: Arc<dyn Fetcher>,
    config: PrecacheConfig,
}

impl ImagePrecacher {
    pub fn new(cache: ResourceCache, network: Arc<dyn Fetcher>, config: PrecacheConfig) -> Self {
        Self {
            cache,
            network,
            config,
        }
    }

    /// Caches a single image; an image already in the cache counts as cached
    pub async fn cache_image(&self, url: &str) -> bool {
        let cache_name = self.cache.version().dynamic_cache();
        if self.cache.lookup(&cache_name, url).await.is_some() {
            return true;
        }

        match self.network.fetch(&Request::get(url)).await {
            Ok(response) if response.is_success() => {
                // Best effort: the image was reachable even if storing failed.
                if let Err(e) = self.cache.store(&cache_name, url, &response).await {
                    debug!(url, error = %e, "Image fetched but not stored");
                }
                true
            }
            Ok(response) => {
                debug!(url, status = response.status, "Image not cached");
                false
            }
            Err(e) => {
                debug!(url, error = %e, "Image not cached");
                false
            }
        }
    }

    /// Caches `urls` in batches, reporting progress after each batch
    pub async fn cache_images<F>(&self, urls: &[String], mut on_progress: F) -> PrecacheStatus
    where
        F: FnMut(PrecacheStatus),
    {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = urls
            .iter()
            .map(String::as_str)
            .filter(|url| seen.insert(*url))
            .collect();

        let total = unique.len();
        let mut cached = 0;
        let mut failed = 0;
        let pause = Duration::from_millis(self.config.pause_ms);
        let batches: Vec<&[&str]> = unique.chunks(self.config.concurrency.max(1)).collect();

        for (i, batch) in batches.iter().enumerate() {
            let results = join_all(batch.iter().map(|url| self.cache_image(url))).await;
            for ok in results {
                if ok {
                    cached += 1;
                } else {
                    failed += 1;
                }
            }
            on_progress(PrecacheStatus::new(total, cached, failed));

            if i + 1 < batches.len() && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        let status = PrecacheStatus::new(total, cached, failed);
        info!(total, cached, failed, "Image pre-caching finished");
        status
    }

    /// Caches the images of `products`
    pub async fn cache_product_images<F>(&self, products: &[Product], on_progress: F) -> PrecacheStatus
    where
        F: FnMut(PrecacheStatus),
    {
        let urls: Vec<String> = products
            .iter()
            .flat_map(|product| {
                if self.config.include_all_images {
                    product.all_image_urls()
                } else {
                    product.primary_image_url().into_iter().collect()
                }
            })
            .map(str::to_string)
            .collect();
        self.cache_images(&urls, on_progress).await
    }
}
