//! Derived product fields and catalog metadata

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::{CatalogMetadata, Product};

/// Version stamped into the catalog metadata
pub const SYNC_VERSION: &str = "3.0.0";

/// Fills in the computed fields of a product fetched from the admin API
pub fn enrich(product: &mut Product, production_url: &str) {
    let first_image = product.images.first();
    product.image_url = first_image.map(|image| image.src.clone());
    product.image_alt = first_image.and_then(|image| image.alt.clone());
    product.product_url = Some(format!(
        "https://{}/products/{}",
        production_url, product.handle
    ));

    let first_variant = product.variants.first();
    product.price = first_variant.and_then(|variant| variant.price);
    product.compare_at_price = first_variant.and_then(|variant| variant.compare_at_price);
    product.is_on_sale = match (product.compare_at_price, product.price) {
        (Some(compare_at), Some(price)) => compare_at > price,
        _ => false,
    };

    product.total_inventory = product
        .variants
        .iter()
        .map(|variant| variant.inventory_quantity.unwrap_or(0))
        .sum();
    product.variant_count = product.variants.len();
    product.image_count = product.images.len();
    product.has_multiple_variants = product.variants.len() > 1;
}

/// Enriches every product and drops the ones without an image
pub fn transform(products: Vec<Product>, production_url: &str) -> Vec<Product> {
    let fetched = products.len();
    let transformed: Vec<Product> = products
        .into_iter()
        .map(|mut product| {
            enrich(&mut product, production_url);
            product
        })
        .filter(|product| product.image_url.is_some())
        .collect();

    info!(
        fetched,
        with_images = transformed.len(),
        without_images = fetched - transformed.len(),
        "Transformed products"
    );
    transformed
}

fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !seen.iter().any(|v| v == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

/// Summary written next to the product list
pub fn build_metadata(products: &[Product], store: &str, now: DateTime<Utc>) -> CatalogMetadata {
    CatalogMetadata {
        total_count: products.len(),
        last_updated: now,
        shopify_store: store.to_string(),
        sync_version: SYNC_VERSION.to_string(),
        vendors: unique(products.iter().map(|p| p.vendor.as_str())),
        product_types: unique(products.iter().map(|p| p.product_type.as_str())),
        total_variants: products.iter().map(|p| p.variant_count).sum(),
        total_images: products.iter().map(|p| p.image_count).sum(),
        products_on_sale: products.iter().filter(|p| p.is_on_sale).count(),
        products_with_multiple_variants: products
            .iter()
            .filter(|p| p.has_multiple_variants)
            .count(),
    }
}

/// Reduced product record bundled for offline use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackProduct {
    pub id: u64,
    pub title: String,
    pub handle: String,
    #[serde(rename = "productUrl")]
    pub product_url: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(rename = "imageAlt")]
    pub image_alt: Option<String>,
    pub price: Option<Decimal>,
    #[serde(rename = "compareAtPrice")]
    pub compare_at_price: Option<Decimal>,
    pub vendor: String,
    pub product_type: String,
    #[serde(rename = "isOnSale")]
    pub is_on_sale: bool,
}

impl From<&Product> for FallbackProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            handle: product.handle.clone(),
            product_url: product.product_url.clone(),
            image_url: product.image_url.clone(),
            image_alt: product.image_alt.clone(),
            price: product.price,
            compare_at_price: product.compare_at_price,
            vendor: product.vendor.clone(),
            product_type: product.product_type.clone(),
            is_on_sale: product.is_on_sale,
        }
    }
}

/// The first `limit` products in reduced form
pub fn fallback_subset(products: &[Product], limit: usize) -> Vec<FallbackProduct> {
    products.iter().take(limit).map(FallbackProduct::from).collect()
}
