//! Display rotation
//!
//! [`RotationEngine`] owns the on-screen working set and the off-screen
//! backlog; [`RotationTimer`] drives it at a fixed interval.

mod cooldown;
mod engine;
mod timer;

pub use cooldown::Cooldown;
pub use engine::{RotationEngine, RotationOutcome, SkipReason};
pub use timer::RotationTimer;
