//! Layout capacity planner
//!
//! Pure functions deciding how many columns the wall has and how many items
//! fit on screen, from the viewport size and orientation.

use crate::config::{CellSize, LayoutConfig, OrientationLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

/// Viewport size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Viewport of a terminal area of `cols` x `rows` cells
    pub fn from_cells(cols: u16, rows: u16, cell: CellSize) -> Self {
        Self {
            width: u32::from(cols) * cell.width,
            height: u32::from(rows) * cell.height,
        }
    }

    /// Portrait iff taller than wide
    pub fn orientation(&self) -> Orientation {
        if self.height > self.width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// Result of planning a viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPlan {
    pub orientation: Orientation,
    pub columns: usize,
    pub capacity: usize,
}

fn orientation_layout(config: &LayoutConfig, orientation: Orientation) -> &OrientationLayout {
    match orientation {
        Orientation::Landscape => &config.landscape,
        Orientation::Portrait => &config.portrait,
    }
}

/// Number of columns that fit across the viewport
pub fn column_count(viewport: Viewport, config: &LayoutConfig) -> usize {
    let layout = orientation_layout(config, viewport.orientation());
    let available = viewport.width.saturating_sub(config.horizontal_padding);
    let per_column = (layout.column_width + layout.gap).max(1);
    let fit = (available / per_column) as usize;
    fit.clamp(layout.min_columns, layout.max_columns.max(layout.min_columns))
}

/// Number of items to keep on screen
///
/// Never more than `total_available`, but never less than the orientation's
/// minimum either, so a tiny catalog still fills what it can.
pub fn display_capacity(viewport: Viewport, config: &LayoutConfig, total_available: usize) -> usize {
    let layout = orientation_layout(config, viewport.orientation());
    let columns = column_count(viewport, config);
    let available = viewport.height.saturating_sub(config.vertical_padding) as f32;
    let item_height = layout.column_width as f32 * layout.aspect_multiplier + layout.gap as f32;
    let rows = if item_height > 0.0 {
        (available / item_height).floor() as usize
    } else {
        0
    };

    (rows * columns)
        .min(layout.max_display.min(total_available))
        .max(layout.min_display)
}

/// Plans columns and capacity for a viewport
pub fn plan(viewport: Viewport, config: &LayoutConfig, total_available: usize) -> GridPlan {
    GridPlan {
        orientation: viewport.orientation(),
        columns: column_count(viewport, config),
        capacity: display_capacity(viewport, config, total_available),
    }
}
