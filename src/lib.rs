//! Product wall library
//!
//! A rotating product display for TV screens with an offline-first resource
//! cache, a layered data acquisition pipeline, and the catalog sync job that
//! produces its data files.

pub mod acquire;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod layout;
pub mod logging;
pub mod net;
pub mod refresh;
pub mod rotation;
pub mod sync;
pub mod ui;
pub mod views;
