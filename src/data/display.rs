//! Render-ready projection of a product onto a wall slot

use std::sync::Arc;

use super::Product;

/// Direction a tile slides in from when it is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideDirection {
    LeftToRight,
    RightToLeft,
}

/// Position of a slot in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    pub index: usize,
    pub column: usize,
    pub row: usize,
    pub is_even_column: bool,
    pub is_even_row: bool,
    pub slide_direction: SlideDirection,
}

impl SlotInfo {
    /// Derives grid position for `index` in a grid with `columns` columns
    pub fn new(index: usize, columns: usize) -> Self {
        let columns = columns.max(1);
        let column = index % columns;
        let row = index / columns;
        let is_even_row = row % 2 == 0;
        Self {
            index,
            column,
            row,
            is_even_column: column % 2 == 0,
            is_even_row,
            slide_direction: if is_even_row {
                SlideDirection::LeftToRight
            } else {
                SlideDirection::RightToLeft
            },
        }
    }
}

/// A product currently placed in a wall slot
///
/// Identity is split in two: the canonical product id never changes, while
/// `epoch` is a render token handed out each time the slot is refilled by
/// rotation. Renderers key on [`DisplayItem::render_key`] and load images
/// through [`DisplayItem::resource_url`], so a refilled slot always looks like
/// new content; the canonical values are recovered without string surgery.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayItem {
    pub product: Arc<Product>,
    pub slot: SlotInfo,
    /// Width / height, drawn from a bounded pool when the item is created
    pub aspect_ratio: f32,
    /// Render epoch; `None` for items placed at initialization
    pub epoch: Option<u64>,
}

impl DisplayItem {
    pub fn new(product: Arc<Product>, slot: SlotInfo, aspect_ratio: f32, epoch: Option<u64>) -> Self {
        Self {
            product,
            slot,
            aspect_ratio,
            epoch,
        }
    }

    /// Canonical product id
    pub fn product_id(&self) -> u64 {
        self.product.id
    }

    /// Key unique per slot and per refill
    pub fn render_key(&self) -> String {
        match self.epoch {
            Some(epoch) => format!("{}-rotation-{}-{}", self.product.id, epoch, self.slot.index),
            None => format!("{}-display-{}", self.product.id, self.slot.index),
        }
    }

    /// Image reference without any render token
    pub fn canonical_url(&self) -> Option<&str> {
        self.product.primary_image_url()
    }

    /// Image reference carrying the render token, so it differs per refill
    pub fn resource_url(&self) -> Option<String> {
        let url = self.canonical_url()?;
        Some(match self.epoch {
            Some(epoch) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}t={epoch}")
            }
            None => url.to_string(),
        })
    }

    /// Caption shown under the tile
    pub fn caption(&self) -> &str {
        &self.product.title
    }

    /// Gives the product back in canonical form for re-queueing
    pub fn into_product(self) -> Arc<Product> {
        self.product
    }
}
