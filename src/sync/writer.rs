//! Output documents and the sync summary

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::transform::fallback_subset;
use super::SyncError;
use crate::data::{CatalogDocument, CatalogMetadata, Product};

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SyncError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|source| SyncError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Wrote file");
    Ok(())
}

/// Writes `products.json`, `products-simple.json` and the fallback subset
///
/// Returns the paths written, in that order.
pub fn write_outputs(
    products: &[Product],
    metadata: &CatalogMetadata,
    output_dir: &Path,
    fallback_path: &Path,
    fallback_size: usize,
) -> Result<Vec<PathBuf>, SyncError> {
    let document = CatalogDocument {
        products: products.to_vec(),
        metadata: metadata.clone(),
    };
    let full = output_dir.join("products.json");
    let simple = output_dir.join("products-simple.json");

    write_json(&full, &document)?;
    write_json(&simple, &products)?;
    write_json(fallback_path, &fallback_subset(products, fallback_size))?;

    Ok(vec![full, simple, fallback_path.to_path_buf()])
}

/// Counts reported at the end of a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub total_products: usize,
    pub with_prices: usize,
    pub on_sale: usize,
    pub with_multiple_variants: usize,
    pub vendors: usize,
    pub product_types: usize,
    pub total_variants: usize,
    pub total_images: usize,
    pub total_inventory: i64,
}

impl SyncReport {
    pub fn new(products: &[Product], fetched: usize) -> Self {
        Self {
            fetched,
            total_products: products.len(),
            with_prices: products.iter().filter(|p| p.price.is_some()).count(),
            on_sale: products.iter().filter(|p| p.is_on_sale).count(),
            with_multiple_variants: products.iter().filter(|p| p.has_multiple_variants).count(),
            vendors: products.iter().map(|p| p.vendor.as_str()).collect::<HashSet<_>>().len(),
            product_types: products
                .iter()
                .map(|p| p.product_type.as_str())
                .collect::<HashSet<_>>()
                .len(),
            total_variants: products.iter().map(|p| p.variant_count).sum(),
            total_images: products.iter().map(|p| p.image_count).sum(),
            total_inventory: products.iter().map(|p| p.total_inventory).sum(),
        }
    }

    /// Products dropped because they had no image
    pub fn skipped(&self) -> usize {
        self.fetched.saturating_sub(self.total_products)
    }

    pub fn log(&self) {
        info!(
            total = self.total_products,
            skipped_without_images = self.skipped(),
            with_prices = self.with_prices,
            on_sale = self.on_sale,
            multiple_variants = self.with_multiple_variants,
            vendors = self.vendors,
            product_types = self.product_types,
            variants = self.total_variants,
            images = self.total_images,
            inventory = self.total_inventory,
            "Sync report"
        );
    }
}
