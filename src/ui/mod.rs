//! UI rendering module for the product wall
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod help_overlay;
pub mod views;
pub mod wall;

pub use help_overlay::render as render_help_overlay;
pub use views::{render_marquee, render_slideshow};
pub use wall::render as render_wall;
