//! Multi-view wall
//!
//! The wall takes turns between views: a marquee of scrolling columns, the
//! rotating grid and a one-product slideshow. [`ViewManager`] decides which
//! view is up and when the next one is due; [`ProductDistribution`] gives
//! each view its own slice of a shuffled catalog, so consecutive views show
//! different products.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::config::{ViewKind, ViewSpec, ViewsConfig};
use crate::data::Product;

/// Lower bound for auto-switch delays and view steps
const MIN_DELAY: Duration = Duration::from_millis(100);

/// A change of the current view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSwitch {
    pub from: ViewKind,
    pub to: ViewKind,
}

/// Tracks the current view and the auto-switch deadline
#[derive(Debug, Clone)]
pub struct ViewManager {
    views: Vec<ViewSpec>,
    current: usize,
    auto_switch: bool,
    last_switch: Instant,
}

impl ViewManager {
    /// Starts on the configured initial view, or the first one if it isn't
    /// part of the order. An empty order falls back to the default cycle.
    pub fn new(config: &ViewsConfig, now: Instant) -> Self {
        let views = if config.order.is_empty() {
            ViewsConfig::default().order
        } else {
            config.order.clone()
        };
        let current = views
            .iter()
            .position(|view| view.kind == config.initial)
            .unwrap_or(0);
        Self {
            views,
            current,
            auto_switch: config.auto_switch,
            last_switch: now,
        }
    }

    pub fn current(&self) -> ViewKind {
        self.views[self.current].kind
    }

    pub fn current_spec(&self) -> &ViewSpec {
        &self.views[self.current]
    }

    pub fn views(&self) -> &[ViewSpec] {
        &self.views
    }

    pub fn auto_switch(&self) -> bool {
        self.auto_switch
    }

    fn go_to(&mut self, index: usize, now: Instant) -> ViewSwitch {
        let from = self.current();
        self.current = index;
        self.last_switch = now;
        let switch = ViewSwitch {
            from,
            to: self.current(),
        };
        debug!(from = ?switch.from, to = ?switch.to, "View switched");
        switch
    }

    pub fn next(&mut self, now: Instant) -> ViewSwitch {
        self.go_to((self.current + 1) % self.views.len(), now)
    }

    pub fn previous(&mut self, now: Instant) -> ViewSwitch {
        let index = self.current.checked_sub(1).unwrap_or(self.views.len() - 1);
        self.go_to(index, now)
    }

    /// Jumps to `kind`; `None` if it is already up or not in the cycle
    pub fn switch_to(&mut self, kind: ViewKind, now: Instant) -> Option<ViewSwitch> {
        let index = self.views.iter().position(|view| view.kind == kind)?;
        if index == self.current {
            return None;
        }
        Some(self.go_to(index, now))
    }

    /// Flips auto-switching; the countdown restarts when it is switched on
    pub fn toggle_auto_switch(&mut self, now: Instant) -> bool {
        self.auto_switch = !self.auto_switch;
        if self.auto_switch {
            self.last_switch = now;
        }
        self.auto_switch
    }

    /// Time left before the next automatic switch, if auto-switching
    pub fn time_until_switch(&self, now: Instant) -> Option<Duration> {
        if !self.auto_switch {
            return None;
        }
        let delay = self.current_spec().switch_delay().max(MIN_DELAY);
        Some(delay.saturating_sub(now.saturating_duration_since(self.last_switch)))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.time_until_switch(now).is_some_and(|left| left.is_zero())
    }
}

/// Where the distribution stands in the shuffled catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleInfo {
    /// Starts at 1 and counts reshuffles
    pub cycle: u64,
    pub position: usize,
    pub total: usize,
    pub per_cycle: usize,
}

/// Splits a shuffled catalog into consecutive slices, one per view
///
/// Slices wrap around the catalog, so a catalog smaller than a view's quota
/// repeats products within that view. Once every view has had its turn the
/// position moves on by one full cycle; past the end it starts over on a
/// fresh shuffle.
pub struct ProductDistribution {
    quotas: Vec<(ViewKind, usize)>,
    products: Vec<Arc<Product>>,
    shuffled: Vec<Arc<Product>>,
    position: usize,
    cycle: u64,
    rng: StdRng,
}

impl ProductDistribution {
    pub fn new(views: &[ViewSpec]) -> Self {
        Self::with_rng(views, StdRng::from_os_rng())
    }

    /// Distribution with a deterministic shuffle
    pub fn with_seed(views: &[ViewSpec], seed: u64) -> Self {
        Self::with_rng(views, StdRng::seed_from_u64(seed))
    }

    fn with_rng(views: &[ViewSpec], rng: StdRng) -> Self {
        Self {
            quotas: views
                .iter()
                .map(|view| (view.kind, view.products_per_view))
                .collect(),
            products: Vec::new(),
            shuffled: Vec::new(),
            position: 0,
            cycle: 0,
            rng,
        }
    }

    /// Replaces the catalog and starts over at cycle 1
    pub fn set_products(&mut self, products: &[Arc<Product>]) {
        self.products = products.to_vec();
        self.reshuffle();
        self.position = 0;
        self.cycle = 1;
        debug!(
            products = self.products.len(),
            per_cycle = self.per_cycle(),
            "Products distributed"
        );
    }

    fn reshuffle(&mut self) {
        self.shuffled = self.products.clone();
        self.shuffled.shuffle(&mut self.rng);
    }

    /// Products shown per full cycle of views
    pub fn per_cycle(&self) -> usize {
        self.quotas.iter().map(|(_, count)| count).sum()
    }

    /// The slice of the shuffled catalog assigned to `kind`
    pub fn products_for(&self, kind: ViewKind) -> Vec<Arc<Product>> {
        let total = self.shuffled.len();
        let Some(index) = self.quotas.iter().position(|(view, _)| *view == kind) else {
            return Vec::new();
        };
        if total == 0 {
            return Vec::new();
        }
        let start = self.position + self.quotas[..index].iter().map(|(_, count)| count).sum::<usize>();
        let count = self.quotas[index].1;
        (start..start + count)
            .map(|i| Arc::clone(&self.shuffled[i % total]))
            .collect()
    }

    /// Moves to the next cycle's slices
    pub fn advance(&mut self) {
        let next = self.position + self.per_cycle();
        if next >= self.shuffled.len() {
            self.position = 0;
            self.cycle += 1;
            self.reshuffle();
        } else {
            self.position = next;
        }
    }

    /// Called when `kind` hands over to the next view; the last view in the
    /// cycle completes it
    pub fn view_finished(&mut self, kind: ViewKind) {
        if self.quotas.last().is_some_and(|(last, _)| *last == kind) {
            self.advance();
        }
    }

    /// Products per category, largest first, ties by name
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for product in &self.products {
            *counts.entry(product.category()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(category, count)| (category.to_string(), count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    pub fn cycle_info(&self) -> CycleInfo {
        CycleInfo {
            cycle: self.cycle,
            position: self.position,
            total: self.products.len(),
            per_cycle: self.per_cycle(),
        }
    }
}

/// Step length of a view, never shorter than the lower bound
pub fn step_interval(spec: &ViewSpec) -> Duration {
    spec.step().max(MIN_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn catalog(count: u64) -> Vec<Arc<Product>> {
        (1..=count)
            .map(|id| {
                let mut product = Product::new(id, format!("Product {id}"));
                product.product_type = if id % 3 == 0 { "Home" } else { "Apparel" }.to_string();
                Arc::new(product)
            })
            .collect()
    }

    fn ids(products: &[Arc<Product>]) -> Vec<u64> {
        products.iter().map(|product| product.id).collect()
    }

    #[test]
    fn test_manager_starts_on_initial_view() {
        let now = Instant::now();
        let manager = ViewManager::new(&ViewsConfig::default(), now);
        assert_eq!(manager.current(), ViewKind::Grid);

        let config = ViewsConfig {
            initial: ViewKind::Slideshow,
            ..ViewsConfig::default()
        };
        assert_eq!(ViewManager::new(&config, now).current(), ViewKind::Slideshow);
    }

    #[test]
    fn test_next_and_previous_wrap_around() {
        let now = Instant::now();
        let config = ViewsConfig {
            initial: ViewKind::Marquee,
            ..ViewsConfig::default()
        };
        let mut manager = ViewManager::new(&config, now);

        let switch = manager.previous(now);
        assert_eq!(switch, ViewSwitch { from: ViewKind::Marquee, to: ViewKind::Slideshow });

        let switch = manager.next(now);
        assert_eq!(switch, ViewSwitch { from: ViewKind::Slideshow, to: ViewKind::Marquee });
        assert_eq!(manager.next(now).to, ViewKind::Grid);
    }

    #[test]
    fn test_switch_to_current_view_is_noop() {
        let now = Instant::now();
        let mut manager = ViewManager::new(&ViewsConfig::default(), now);

        assert!(manager.switch_to(ViewKind::Grid, now).is_none());
        assert_eq!(manager.switch_to(ViewKind::Slideshow, now).map(|s| s.to), Some(ViewKind::Slideshow));
    }

    #[test]
    fn test_switch_is_due_after_view_delay() {
        let now = Instant::now();
        let manager = ViewManager::new(&ViewsConfig::default(), now);

        assert!(!manager.is_due(now + Duration::from_secs(22)));
        assert!(manager.is_due(now + Duration::from_millis(22_500)));
        assert_eq!(
            manager.time_until_switch(now + Duration::from_secs(20)),
            Some(Duration::from_millis(2_500))
        );
    }

    #[test]
    fn test_switching_restarts_countdown() {
        let now = Instant::now();
        let mut manager = ViewManager::new(&ViewsConfig::default(), now);

        let later = now + Duration::from_secs(30);
        manager.next(later);

        // Slideshow stays up for 37.5 s from the switch.
        assert!(!manager.is_due(later + Duration::from_secs(37)));
        assert!(manager.is_due(later + Duration::from_millis(37_500)));
    }

    #[test]
    fn test_toggle_auto_switch() {
        let now = Instant::now();
        let mut manager = ViewManager::new(&ViewsConfig::default(), now);

        assert!(!manager.toggle_auto_switch(now));
        assert!(manager.time_until_switch(now).is_none());
        assert!(!manager.is_due(now + Duration::from_secs(3600)));

        let later = now + Duration::from_secs(3600);
        assert!(manager.toggle_auto_switch(later));
        assert!(!manager.is_due(later + Duration::from_secs(1)));
    }

    #[test]
    fn test_empty_order_uses_default_cycle() {
        let config = ViewsConfig {
            order: Vec::new(),
            ..ViewsConfig::default()
        };
        let manager = ViewManager::new(&config, Instant::now());
        assert_eq!(manager.views().len(), 3);
    }

    #[test]
    fn test_views_get_consecutive_slices() {
        let views = ViewsConfig::default().order;
        let mut distribution = ProductDistribution::with_seed(&views, 1);
        distribution.set_products(&catalog(100));

        let marquee = distribution.products_for(ViewKind::Marquee);
        let grid = distribution.products_for(ViewKind::Grid);
        let slideshow = distribution.products_for(ViewKind::Slideshow);

        assert_eq!(marquee.len(), 20);
        assert_eq!(grid.len(), 15);
        assert_eq!(slideshow.len(), 15);
        let all: HashSet<u64> = ids(&marquee)
            .into_iter()
            .chain(ids(&grid))
            .chain(ids(&slideshow))
            .collect();
        assert_eq!(all.len(), 50, "No product appears in two views");
    }

    #[test]
    fn test_small_catalog_wraps_within_view() {
        let views = ViewsConfig::default().order;
        let mut distribution = ProductDistribution::with_seed(&views, 1);
        distribution.set_products(&catalog(8));

        let marquee = distribution.products_for(ViewKind::Marquee);

        assert_eq!(marquee.len(), 20);
        let unique: HashSet<u64> = ids(&marquee).into_iter().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn test_last_view_completes_cycle() {
        let views = ViewsConfig::default().order;
        let mut distribution = ProductDistribution::with_seed(&views, 1);
        distribution.set_products(&catalog(120));
        let first = ids(&distribution.products_for(ViewKind::Marquee));

        distribution.view_finished(ViewKind::Marquee);
        distribution.view_finished(ViewKind::Grid);
        assert_eq!(distribution.cycle_info().position, 0);

        distribution.view_finished(ViewKind::Slideshow);
        assert_eq!(distribution.cycle_info().position, 50);
        assert_ne!(ids(&distribution.products_for(ViewKind::Marquee)), first);
    }

    #[test]
    fn test_passing_the_end_reshuffles_into_new_cycle() {
        let views = ViewsConfig::default().order;
        let mut distribution = ProductDistribution::with_seed(&views, 1);
        distribution.set_products(&catalog(120));

        distribution.advance();
        distribution.advance();
        assert_eq!(distribution.cycle_info().position, 100);
        distribution.advance();

        let info = distribution.cycle_info();
        assert_eq!(info.position, 0);
        assert_eq!(info.cycle, 2);
        assert_eq!(info.total, 120);
        assert_eq!(info.per_cycle, 50);
    }

    #[test]
    fn test_empty_catalog_gives_empty_views() {
        let views = ViewsConfig::default().order;
        let mut distribution = ProductDistribution::with_seed(&views, 1);
        distribution.set_products(&[]);

        assert!(distribution.products_for(ViewKind::Grid).is_empty());
        distribution.advance();
        assert!(distribution.category_counts().is_empty());
    }

    #[test]
    fn test_category_counts_largest_first() {
        let views = ViewsConfig::default().order;
        let mut distribution = ProductDistribution::with_seed(&views, 1);
        let mut products = catalog(9);
        products.push(Arc::new(Product::new(10, "Loose")));
        distribution.set_products(&products);

        assert_eq!(
            distribution.category_counts(),
            vec![
                ("Apparel".to_string(), 6),
                ("Home".to_string(), 3),
                ("Uncategorized".to_string(), 1),
            ]
        );
    }
}
