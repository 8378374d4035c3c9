//! Caching layers for the product wall
//!
//! Two independent caches live here. The [`ProductStore`] keeps the last
//! loaded product list with a freshness timestamp and is consulted by the
//! acquisition pipeline. The [`ResourceCache`] stores raw responses under
//! versioned cache names and is driven by the [`Interceptor`], which answers
//! requests cache-first or network-first and is controlled through the
//! [`WorkerHandle`] message channel.

mod interceptor;
mod precache;
mod resource;
mod store;
mod worker;

pub use interceptor::{Interceptor, WorkerState};
pub use precache::{ImagePrecacher, PrecacheStatus};
pub use resource::{CacheError, CacheVersion, CachedResponse, ResourceCache};
pub use store::{CachedProducts, ProductStore, StoreError, PRODUCTS_KEY, TIMESTAMP_KEY};
pub use worker::{WorkerHandle, WorkerMessage, WorkerReply};
