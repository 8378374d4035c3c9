//! Core data models for the product wall
//!
//! This module contains the catalog types produced by the sync job and
//! consumed read-only by the display layer, plus the payload shapes the
//! product documents come in.

pub mod display;

pub use display::{DisplayItem, SlideDirection, SlotInfo};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog item as written by the sync job
///
/// Shopify fields keep their snake_case names; the fields computed by the
/// sync job use camelCase. Everything except `id` and `title` has a default,
/// so the reduced fallback subset parses into the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Comma-separated tag list, as Shopify stores it
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub image: Option<ProductImage>,

    #[serde(default, rename = "productUrl")]
    pub product_url: Option<String>,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default, rename = "imageAlt")]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, rename = "compareAtPrice")]
    pub compare_at_price: Option<Decimal>,
    #[serde(default, rename = "totalInventory")]
    pub total_inventory: i64,
    #[serde(default, rename = "variantCount")]
    pub variant_count: usize,
    #[serde(default, rename = "imageCount")]
    pub image_count: usize,
    #[serde(default, rename = "hasMultipleVariants")]
    pub has_multiple_variants: bool,
    #[serde(default, rename = "isOnSale")]
    pub is_on_sale: bool,
}

impl Product {
    /// Creates a minimal product, mostly useful for fixtures
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            handle: String::new(),
            body_html: None,
            vendor: String::new(),
            product_type: String::new(),
            status: None,
            tags: String::new(),
            created_at: None,
            updated_at: None,
            published_at: None,
            variants: Vec::new(),
            options: Vec::new(),
            images: Vec::new(),
            image: None,
            product_url: None,
            image_url: None,
            image_alt: None,
            price: None,
            compare_at_price: None,
            total_inventory: 0,
            variant_count: 0,
            image_count: 0,
            has_multiple_variants: false,
            is_on_sale: false,
        }
    }

    /// Tags split on commas, trimmed, empty entries dropped
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    /// Primary image URL: the computed field, else the first image
    pub fn primary_image_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or_else(|| self.images.first().map(|image| image.src.as_str()))
    }

    /// All image URLs of the product, primary first
    pub fn all_image_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.primary_image_url().into_iter().collect();
        for image in &self.images {
            if !urls.contains(&image.src.as_str()) {
                urls.push(image.src.as_str());
            }
        }
        urls
    }

    /// Category shown on the wall, "Uncategorized" when empty
    pub fn category(&self) -> &str {
        if self.product_type.is_empty() {
            "Uncategorized"
        } else {
            &self.product_type
        }
    }
}

/// A purchasable variant of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

/// A product option such as "Size" or "Color"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOption {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A product image hosted on the commerce platform's CDN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    #[serde(default)]
    pub id: Option<u64>,
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Summary written next to the product list by the sync job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMetadata {
    pub total_count: usize,
    pub last_updated: DateTime<Utc>,
    pub shopify_store: String,
    pub sync_version: String,
    pub vendors: Vec<String>,
    pub product_types: Vec<String>,
    pub total_variants: usize,
    pub total_images: usize,
    pub products_on_sale: usize,
    pub products_with_multiple_variants: usize,
}

/// The primary catalog document: products plus summary metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub products: Vec<Product>,
    pub metadata: CatalogMetadata,
}

/// Product documents come either wrapped (`{"products": [...]}`) or bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProductPayload {
    Wrapped { products: Vec<Product> },
    Bare(Vec<Product>),
}

/// Parses a product document in either accepted shape
pub fn parse_products(bytes: &[u8]) -> Result<Vec<Product>, serde_json::Error> {
    let payload: ProductPayload = serde_json::from_slice(bytes)?;
    Ok(match payload {
        ProductPayload::Wrapped { products } => products,
        ProductPayload::Bare(products) => products,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_products_accepts_bare_array() {
        let json = r#"[{"id": 1, "title": "Mug"}, {"id": 2, "title": "Tote"}]"#;
        let products = parse_products(json.as_bytes()).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].title, "Tote");
    }

    #[test]
    fn test_parse_products_accepts_wrapped_document() {
        let json = r#"{"products": [{"id": 7, "title": "Scarf"}], "metadata": {"anything": true}}"#;
        let products = parse_products(json.as_bytes()).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, 7);
    }

    #[test]
    fn test_parse_products_rejects_other_shapes() {
        assert!(parse_products(br#"{"items": []}"#).is_err());
        assert!(parse_products(b"not json").is_err());
    }

    #[test]
    fn test_fallback_subset_fields_parse_into_product() {
        let json = r#"[{
            "id": 42,
            "title": "Linen Shirt",
            "handle": "linen-shirt",
            "productUrl": "https://shop.example/products/linen-shirt",
            "imageUrl": "https://cdn.shopify.com/linen.jpg",
            "imageAlt": null,
            "price": "49.90",
            "compareAtPrice": "59.90",
            "vendor": "Acme",
            "product_type": "Shirts",
            "isOnSale": true
        }]"#;
        let products = parse_products(json.as_bytes()).unwrap();
        let product = &products[0];

        assert_eq!(product.price, Some(Decimal::from_str("49.90").unwrap()));
        assert_eq!(product.compare_at_price, Some(Decimal::from_str("59.90").unwrap()));
        assert!(product.is_on_sale);
        assert_eq!(product.primary_image_url(), Some("https://cdn.shopify.com/linen.jpg"));
        assert!(product.variants.is_empty());
    }

    #[test]
    fn test_shopify_timestamps_with_offsets_parse() {
        let json = r#"[{"id": 1, "title": "A", "created_at": "2024-03-01T10:00:00-05:00"}]"#;
        let products = parse_products(json.as_bytes()).unwrap();
        let created = products[0].created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2024-03-01T15:00:00+00:00");
    }

    #[test]
    fn test_tag_list_trims_and_drops_empty() {
        let mut product = Product::new(1, "A");
        product.tags = "summer, sale,, new ".to_string();
        assert_eq!(product.tag_list(), vec!["summer", "sale", "new"]);
    }

    #[test]
    fn test_all_image_urls_puts_primary_first_without_duplicates() {
        let mut product = Product::new(1, "A");
        product.images = vec![
            ProductImage { id: Some(1), src: "a.jpg".into(), alt: None, width: None, height: None },
            ProductImage { id: Some(2), src: "b.jpg".into(), alt: None, width: None, height: None },
        ];
        product.image_url = Some("b.jpg".to_string());
        assert_eq!(product.all_image_urls(), vec!["b.jpg", "a.jpg"]);
    }

    #[test]
    fn test_category_defaults_to_uncategorized() {
        let mut product = Product::new(1, "A");
        assert_eq!(product.category(), "Uncategorized");
        product.product_type = "Hats".to_string();
        assert_eq!(product.category(), "Hats");
    }
}
