//! Working set / backlog rotation
//!
//! The engine keeps a fixed-size working set of display items on screen and
//! an off-screen backlog queue of products. Each rotation takes the product at
//! the front of the backlog, puts it into a randomly chosen eligible slot and
//! sends the product it displaced to the back of the backlog, so every product
//! cycles through the screen and none is ever dropped or duplicated.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{RotationConfig, RotationMode};
use crate::data::{DisplayItem, Product, SlotInfo};
use crate::rotation::Cooldown;

/// Why a rotation step did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyBacklog,
    EmptyWorkingSet,
    /// Off-screen mode and every slot is currently visible
    NoOffscreenSlots,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    Replaced {
        slot: usize,
        /// Product now shown in the slot
        incoming: u64,
        /// Product moved to the back of the backlog
        outgoing: u64,
        epoch: u64,
    },
    Skipped(SkipReason),
}

pub struct RotationEngine {
    working_set: Vec<DisplayItem>,
    backlog: VecDeque<Arc<Product>>,
    cooldown: Cooldown,
    visible: HashSet<usize>,
    mode: RotationMode,
    columns: usize,
    aspect_ratios: Vec<f32>,
    cycle_length: Option<usize>,
    shuffle_on_init: bool,
    rotation_count: u64,
    cycle: u64,
    total_shown: u64,
    cooldown_resets: u64,
    /// Bumped on every change to the working set
    generation: u64,
    next_epoch: u64,
    rng: StdRng,
}

impl RotationEngine {
    pub fn new(config: &RotationConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Engine with a deterministic random sequence
    pub fn with_seed(config: &RotationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &RotationConfig, rng: StdRng) -> Self {
        Self {
            working_set: Vec::new(),
            backlog: VecDeque::new(),
            cooldown: Cooldown::new(config.cooldown_period),
            visible: HashSet::new(),
            mode: config.mode,
            columns: 1,
            aspect_ratios: config.aspect_ratios.clone(),
            cycle_length: config.cycle_length,
            shuffle_on_init: config.shuffle_on_start,
            rotation_count: 0,
            cycle: 1,
            total_shown: 0,
            cooldown_resets: 0,
            generation: 0,
            next_epoch: 1,
            rng,
        }
    }

    /// Fills the working set with the first `capacity` products
    ///
    /// Everything else goes to the backlog in order. Cooldown, visibility
    /// and counters are reset.
    pub fn initialize(&mut self, products: &[Arc<Product>], capacity: usize, columns: usize) {
        let shuffle = self.shuffle_on_init;
        self.reset(products, capacity, columns, shuffle);
    }

    /// Re-initializes with the products in random order
    pub fn shuffle(&mut self, products: &[Arc<Product>], capacity: usize, columns: usize) {
        self.reset(products, capacity, columns, true);
    }

    fn reset(&mut self, products: &[Arc<Product>], capacity: usize, columns: usize, shuffle: bool) {
        let mut ordered = products.to_vec();
        if shuffle {
            ordered.shuffle(&mut self.rng);
        }

        let take = capacity.min(ordered.len());
        let backlog: VecDeque<Arc<Product>> = ordered.split_off(take).into();
        let columns = columns.max(1);
        let mut working_set = Vec::with_capacity(take);
        for (index, product) in ordered.into_iter().enumerate() {
            let aspect_ratio = self.random_aspect_ratio();
            working_set.push(DisplayItem::new(
                product,
                SlotInfo::new(index, columns),
                aspect_ratio,
                None,
            ));
        }
        self.columns = columns;
        self.working_set = working_set;
        self.backlog = backlog;
        self.cooldown.clear();
        self.visible.clear();
        self.rotation_count = 0;
        self.cycle = 1;
        self.total_shown = take as u64;
        self.generation += 1;

        debug!(
            displayed = self.working_set.len(),
            backlog = self.backlog.len(),
            columns = self.columns,
            "Rotation engine initialized"
        );
    }

    fn random_aspect_ratio(&mut self) -> f32 {
        self.aspect_ratios.choose(&mut self.rng).copied().unwrap_or(1.0)
    }

    /// Slots currently visible on screen
    pub fn set_visible(&mut self, slots: impl IntoIterator<Item = usize>) {
        self.visible = slots.into_iter().collect();
    }

    fn pick_slot(&mut self) -> Option<usize> {
        let candidates: Vec<usize> = (0..self.working_set.len())
            .filter(|slot| self.mode != RotationMode::OffscreenOnly || !self.visible.contains(slot))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let mut eligible: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|slot| !self.cooldown.contains(*slot))
            .collect();
        if eligible.is_empty() {
            // Every candidate is cooling down; start over rather than stall.
            self.cooldown.clear();
            self.cooldown_resets += 1;
            eligible = candidates;
        }

        let index = self.rng.random_range(0..eligible.len());
        Some(eligible[index])
    }

    /// Replaces one slot with the next product from the backlog
    pub fn rotate(&mut self) -> RotationOutcome {
        if self.working_set.is_empty() {
            return RotationOutcome::Skipped(SkipReason::EmptyWorkingSet);
        }
        if self.backlog.is_empty() {
            return RotationOutcome::Skipped(SkipReason::EmptyBacklog);
        }
        let Some(slot) = self.pick_slot() else {
            return RotationOutcome::Skipped(SkipReason::NoOffscreenSlots);
        };
        let Some(incoming) = self.backlog.pop_front() else {
            return RotationOutcome::Skipped(SkipReason::EmptyBacklog);
        };

        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let aspect_ratio = self.random_aspect_ratio();
        let incoming_id = incoming.id;
        let item = DisplayItem::new(
            incoming,
            SlotInfo::new(slot, self.columns),
            aspect_ratio,
            Some(epoch),
        );

        let outgoing = std::mem::replace(&mut self.working_set[slot], item).into_product();
        let outgoing_id = outgoing.id;
        self.backlog.push_back(outgoing);
        self.cooldown.record(slot);

        self.generation += 1;
        self.total_shown += 1;
        self.rotation_count += 1;
        let cycle_length = self
            .cycle_length
            .unwrap_or(self.working_set.len())
            .max(1) as u64;
        if self.rotation_count % cycle_length == 0 {
            self.cycle += 1;
            debug!(cycle = self.cycle, "Rotation cycle complete");
        }

        RotationOutcome::Replaced {
            slot,
            incoming: incoming_id,
            outgoing: outgoing_id,
            epoch,
        }
    }

    pub fn working_set(&self) -> &[DisplayItem] {
        &self.working_set
    }

    pub fn backlog(&self) -> &VecDeque<Arc<Product>> {
        &self.backlog
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    pub fn visible(&self) -> &HashSet<usize> {
        &self.visible
    }

    pub fn mode(&self) -> RotationMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.working_set.len()
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rotation_count(&self) -> u64 {
        self.rotation_count
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Products placed on screen since initialization, repeats included
    pub fn total_shown(&self) -> u64 {
        self.total_shown
    }

    /// Times the cooldown was cleared because no slot was eligible
    pub fn cooldown_resets(&self) -> u64 {
        self.cooldown_resets
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Canonical ids of every product held, working set first
    pub fn product_ids(&self) -> Vec<u64> {
        self.working_set
            .iter()
            .map(DisplayItem::product_id)
            .chain(self.backlog.iter().map(|product| product.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn products(count: u64) -> Vec<Arc<Product>> {
        (0..count)
            .map(|id| {
                let mut product = Product::new(id, format!("Product {id}"));
                product.image_url = Some(format!("https://cdn.shopify.com/{id}.jpg"));
                Arc::new(product)
            })
            .collect()
    }

    fn engine(config: RotationConfig) -> RotationEngine {
        RotationEngine::with_seed(&config, 7)
    }

    fn sorted(mut ids: Vec<u64>) -> Vec<u64> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_initialize_splits_working_set_and_backlog() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(100), 20, 4);

        assert_eq!(engine.capacity(), 20);
        assert_eq!(engine.backlog().len(), 80);
        let shown: Vec<u64> = engine.working_set().iter().map(DisplayItem::product_id).collect();
        assert_eq!(shown, (0..20).collect::<Vec<_>>());
        assert_eq!(engine.backlog().front().map(|p| p.id), Some(20));
        assert_eq!(engine.working_set()[5].render_key(), "5-display-5");
        assert_eq!(engine.working_set()[5].slot.column, 1);
        assert_eq!(engine.working_set()[5].slot.row, 1);
    }

    #[test]
    fn test_initialize_with_fewer_products_than_capacity() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(3), 20, 4);

        assert_eq!(engine.capacity(), 3);
        assert!(engine.backlog().is_empty());
        assert_eq!(
            engine.rotate(),
            RotationOutcome::Skipped(SkipReason::EmptyBacklog)
        );
    }

    #[test]
    fn test_rotate_on_empty_engine_is_noop() {
        let mut engine = engine(RotationConfig::default());
        assert_eq!(
            engine.rotate(),
            RotationOutcome::Skipped(SkipReason::EmptyWorkingSet)
        );
    }

    #[test]
    fn test_one_rotation_moves_replaced_product_to_back() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(100), 20, 4);

        let RotationOutcome::Replaced { slot, incoming, outgoing, epoch } = engine.rotate() else {
            panic!("expected a replacement");
        };

        assert_eq!(engine.capacity(), 20);
        assert_eq!(engine.backlog().len(), 80);
        assert_eq!(incoming, 20);
        assert_eq!(outgoing, slot as u64);

        let item = &engine.working_set()[slot];
        assert_eq!(item.product_id(), 20);
        assert_eq!(item.epoch, Some(epoch));
        assert_eq!(item.render_key(), format!("20-rotation-{epoch}-{slot}"));
        assert!(item.resource_url().unwrap().ends_with(&format!("?t={epoch}")));

        let back = engine.backlog().back().unwrap();
        assert_eq!(back.id, outgoing);
        assert_eq!(
            back.image_url.as_deref(),
            Some(format!("https://cdn.shopify.com/{outgoing}.jpg").as_str())
        );
        assert_eq!(engine.backlog().front().map(|p| p.id), Some(21));
    }

    #[test]
    fn test_rotation_preserves_product_set() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(37), 12, 3);

        for _ in 0..500 {
            engine.rotate();
            assert_eq!(engine.capacity(), 12);
            assert_eq!(sorted(engine.product_ids()), (0..37).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_replaced_slot_is_not_reused_within_cooldown() {
        let period = 3;
        let config = RotationConfig {
            cooldown_period: period,
            ..RotationConfig::default()
        };
        let mut engine = engine(config);
        engine.initialize(&products(50), 10, 5);

        let mut history: Vec<usize> = Vec::new();
        for _ in 0..300 {
            let resets = engine.cooldown_resets();
            let RotationOutcome::Replaced { slot, .. } = engine.rotate() else {
                panic!("expected a replacement");
            };
            if engine.cooldown_resets() == resets {
                assert!(
                    history.iter().rev().take(period).all(|s| *s != slot),
                    "slot {slot} reused within cooldown"
                );
            }
            history.push(slot);
            assert!(engine.cooldown().len() <= period);
        }
        assert_eq!(engine.cooldown_resets(), 0);
    }

    #[test]
    fn test_exhausted_cooldown_is_cleared() {
        let config = RotationConfig {
            cooldown_period: 5,
            ..RotationConfig::default()
        };
        let mut engine = engine(config);
        engine.initialize(&products(10), 2, 2);

        for _ in 0..10 {
            assert!(matches!(engine.rotate(), RotationOutcome::Replaced { .. }));
        }
        assert!(engine.cooldown_resets() > 0);
    }

    #[test]
    fn test_offscreen_mode_only_replaces_hidden_slots() {
        let config = RotationConfig {
            mode: RotationMode::OffscreenOnly,
            ..RotationConfig::default()
        };
        let mut engine = engine(config);
        engine.initialize(&products(40), 10, 5);
        engine.set_visible(0..8);

        for _ in 0..50 {
            let RotationOutcome::Replaced { slot, .. } = engine.rotate() else {
                panic!("expected a replacement");
            };
            assert!(slot >= 8, "visible slot {slot} was replaced");
        }
    }

    #[test]
    fn test_offscreen_mode_skips_when_everything_is_visible() {
        let config = RotationConfig {
            mode: RotationMode::OffscreenOnly,
            ..RotationConfig::default()
        };
        let mut engine = engine(config);
        engine.initialize(&products(40), 10, 5);
        engine.set_visible(0..10);
        let generation = engine.generation();

        assert_eq!(
            engine.rotate(),
            RotationOutcome::Skipped(SkipReason::NoOffscreenSlots)
        );
        assert_eq!(engine.backlog().len(), 30);
        assert_eq!(engine.generation(), generation);
    }

    #[test]
    fn test_cooldown_mode_ignores_visibility() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(40), 10, 5);
        engine.set_visible(0..10);

        assert!(matches!(engine.rotate(), RotationOutcome::Replaced { .. }));
    }

    #[test]
    fn test_cycle_counter_follows_working_set_size() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(30), 5, 5);

        for _ in 0..4 {
            engine.rotate();
        }
        assert_eq!(engine.cycle(), 1);
        engine.rotate();
        assert_eq!(engine.cycle(), 2);
        assert_eq!(engine.rotation_count(), 5);
        assert_eq!(engine.total_shown(), 10);
    }

    #[test]
    fn test_explicit_cycle_length() {
        let config = RotationConfig {
            cycle_length: Some(2),
            ..RotationConfig::default()
        };
        let mut engine = engine(config);
        engine.initialize(&products(30), 5, 5);

        for _ in 0..6 {
            engine.rotate();
        }
        assert_eq!(engine.cycle(), 4);
    }

    #[test]
    fn test_epochs_are_unique_across_rotations() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(30), 5, 5);

        let mut epochs = HashSet::new();
        for _ in 0..20 {
            if let RotationOutcome::Replaced { epoch, .. } = engine.rotate() {
                assert!(epochs.insert(epoch));
            }
        }
    }

    #[test]
    fn test_every_rotation_bumps_generation() {
        let mut engine = engine(RotationConfig::default());
        engine.initialize(&products(30), 5, 5);
        let before = engine.generation();

        engine.rotate();

        assert_eq!(engine.generation(), before + 1);
    }

    #[test]
    fn test_shuffle_resets_state_and_keeps_products() {
        let mut engine = engine(RotationConfig::default());
        let all = products(60);
        engine.initialize(&all, 12, 4);
        for _ in 0..7 {
            engine.rotate();
        }

        engine.shuffle(&all, 12, 4);

        assert_eq!(engine.rotation_count(), 0);
        assert_eq!(engine.cycle(), 1);
        assert!(engine.cooldown().is_empty());
        assert!(engine.working_set().iter().all(|item| item.epoch.is_none()));
        assert_eq!(sorted(engine.product_ids()), (0..60).collect::<Vec<_>>());
        let shown: Vec<u64> = engine.working_set().iter().map(DisplayItem::product_id).collect();
        assert_ne!(shown, (0..12).collect::<Vec<_>>(), "shuffle should reorder");
    }

    #[test]
    fn test_aspect_ratios_come_from_pool() {
        let config = RotationConfig::default();
        let pool = config.aspect_ratios.clone();
        let mut engine = engine(config);
        engine.initialize(&products(30), 10, 5);
        for _ in 0..20 {
            engine.rotate();
        }

        assert!(engine
            .working_set()
            .iter()
            .all(|item| pool.contains(&item.aspect_ratio)));
    }

    #[test]
    fn test_reinitialize_with_new_capacity() {
        let mut engine = engine(RotationConfig::default());
        let all = products(50);
        engine.initialize(&all, 18, 6);
        engine.rotate();

        engine.initialize(&all, 28, 4);

        assert_eq!(engine.capacity(), 28);
        assert_eq!(engine.backlog().len(), 22);
        assert_eq!(engine.columns(), 4);
        assert_eq!(engine.working_set()[27].slot.row, 6);
    }
}
