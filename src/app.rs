//! Application state management for the product wall
//!
//! This module contains the main application state: the rotation engine and
//! its timer, the current grid plan, the view cycle, keyboard handling, and
//! the bookkeeping for requests that the event loop carries out asynchronously.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::Rect;
use tracing::{debug, info, warn};

use crate::acquire::{LoadedProducts, ProductSource};
use crate::cache::{ImagePrecacher, PrecacheStatus, WorkerHandle, WorkerMessage};
use crate::config::{ViewKind, WallConfig};
use crate::data::Product;
use crate::layout::{self, GridPlan, Viewport};
use crate::refresh::{RefreshHandle, RefreshMessage};
use crate::rotation::{RotationEngine, RotationOutcome, RotationTimer};
use crate::ui;
use crate::views::{self, ProductDistribution, ViewManager, ViewSwitch};

/// Application state enum representing the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Initial loading state while fetching data
    Loading,
    /// The product wall
    Wall,
    /// No product data could be obtained from any source
    Error(String),
}

/// Background services the event loop hands to [`App::process_requests`]
pub struct Services {
    pub worker: WorkerHandle,
    /// `None` when pre-caching is switched off
    pub precacher: Option<ImagePrecacher>,
    pub refresh: RefreshHandle,
}

/// Main application struct managing state and data
pub struct App {
    /// Current application state/view
    pub state: AppState,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Development mode: fast rotation and manual stepping
    pub dev_mode: bool,
    /// Flag indicating a refresh has been requested
    pub refresh_requested: bool,
    pub clear_cache_requested: bool,
    pub version_requested: bool,
    /// A refresh is running in the background
    pub refreshing: bool,
    /// Products in the order they were loaded
    pub products: Vec<Arc<Product>>,
    pub engine: RotationEngine,
    pub plan: Option<GridPlan>,
    /// Where the current products came from
    pub source: Option<ProductSource>,
    /// When the current products were fetched or cached
    pub last_updated: Option<DateTime<Utc>>,
    /// Timestamp of last data refresh
    pub last_refresh: Option<DateTime<Local>>,
    /// Last version token reported by the cache worker
    pub cache_version: Option<String>,
    pub precache: Option<PrecacheStatus>,
    /// One-line notice shown in the footer
    pub status_message: Option<String>,
    /// Terminal size in cells
    pub size: (u16, u16),
    pub views: ViewManager,
    pub distribution: ProductDistribution,
    /// Scroll or slide position of the marquee and slideshow views
    pub view_step: usize,
    next_view_step_at: Option<Instant>,
    config: WallConfig,
    timer: Option<RotationTimer>,
    resume_rotation_at: Option<Instant>,
    /// Products to hand to the cache worker and pre-cacher
    pending_cache: Option<Vec<Product>>,
}

impl App {
    /// Creates a new App for a terminal of `size` cells
    pub fn new(config: WallConfig, dev_mode: bool, size: (u16, u16)) -> Self {
        Self {
            state: AppState::Loading,
            should_quit: false,
            show_help: false,
            dev_mode,
            refresh_requested: false,
            clear_cache_requested: false,
            version_requested: false,
            refreshing: false,
            products: Vec::new(),
            engine: RotationEngine::new(&config.rotation),
            plan: None,
            source: None,
            last_updated: None,
            last_refresh: None,
            cache_version: None,
            precache: None,
            status_message: None,
            size,
            views: ViewManager::new(&config.views, Instant::now()),
            distribution: ProductDistribution::new(&config.views.order),
            view_step: 0,
            next_view_step_at: None,
            config,
            timer: None,
            resume_rotation_at: None,
            pending_cache: None,
        }
    }

    /// Replaces the rotation engine, e.g. with a seeded one
    pub fn with_engine(mut self, engine: RotationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the product distribution, e.g. with a seeded one
    pub fn with_distribution(mut self, distribution: ProductDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn config(&self) -> &WallConfig {
        &self.config
    }

    /// Interval between rotations for the current mode
    pub fn rotation_interval(&self) -> Duration {
        self.config.rotation.interval(self.dev_mode)
    }

    /// Whether the rotation timer is running
    pub fn is_rotating(&self) -> bool {
        self.timer.is_some()
    }

    /// When a stopped rotation timer is due to start again
    pub fn resume_rotation_at(&self) -> Option<Instant> {
        self.resume_rotation_at
    }

    /// Takes a freshly loaded product list onto the wall
    ///
    /// Network data is also queued for the cache worker and the image
    /// pre-cacher.
    pub fn apply_loaded(&mut self, loaded: LoadedProducts) {
        info!(
            products = loaded.products.len(),
            source = %loaded.source,
            "Products loaded"
        );
        if loaded.source == ProductSource::Network && self.config.worker.enabled {
            self.pending_cache = Some(loaded.products.clone());
        }
        self.products = loaded.products.into_iter().map(Arc::new).collect();
        self.source = Some(loaded.source);
        self.last_updated = loaded.last_updated;
        self.last_refresh = Some(Local::now());
        self.refreshing = false;
        self.state = AppState::Wall;
        self.distribution.set_products(&self.products);
        self.view_step = 0;
        self.reinitialize();
    }

    /// Applies a message from the background refresh task
    pub fn handle_refresh_message(&mut self, message: RefreshMessage) {
        match message {
            RefreshMessage::RefreshStarted => {
                self.refreshing = true;
            }
            RefreshMessage::ProductsLoaded(loaded) => {
                self.status_message = None;
                self.apply_loaded(loaded);
            }
            RefreshMessage::LoadFailed(error) => {
                self.refreshing = false;
                if self.products.is_empty() {
                    self.state = AppState::Error(error);
                } else {
                    // Keep showing what we have.
                    self.status_message = Some(format!("Refresh failed: {error}"));
                }
            }
            RefreshMessage::PrecacheProgress(status) => {
                self.precache = Some(status);
            }
        }
    }

    /// Re-plans the grid after the terminal was resized
    ///
    /// The wall is only rebuilt when the plan actually changes; otherwise
    /// just the set of visible slots is refreshed.
    pub fn handle_resize(&mut self, cols: u16, rows: u16) {
        self.size = (cols, rows);
        if self.state != AppState::Wall {
            return;
        }
        if Some(self.current_plan()) != self.plan {
            self.reinitialize();
        } else {
            self.update_visibility();
        }
    }

    fn current_plan(&self) -> GridPlan {
        let (cols, rows) = self.size;
        let viewport = Viewport::from_cells(cols, rows, self.config.cell_px);
        layout::plan(viewport, &self.config.layout, self.products.len())
    }

    fn update_visibility(&mut self) {
        let (cols, rows) = self.size;
        let area = ui::wall::wall_area(Rect::new(0, 0, cols, rows));
        let visible = ui::wall::visible_slot_count(area, self.engine.capacity(), self.engine.columns());
        self.engine.set_visible(0..visible);
    }

    /// Stops rotation and rebuilds the wall from the product list
    fn reinitialize(&mut self) {
        self.stop_rotation();
        let plan = self.current_plan();
        self.engine.initialize(&self.products, plan.capacity, plan.columns);
        self.plan = Some(plan);
        self.update_visibility();
        self.resume_rotation_at = Some(Instant::now());
        debug!(
            columns = plan.columns,
            capacity = plan.capacity,
            orientation = ?plan.orientation,
            "Wall initialized"
        );
    }

    /// Reshuffles the wall; rotation resumes after the settle delay
    pub fn shuffle(&mut self) {
        let Some(plan) = self.plan else {
            return;
        };
        self.stop_rotation();
        self.engine.shuffle(&self.products, plan.capacity, plan.columns);
        self.update_visibility();
        self.resume_rotation_at = Some(Instant::now() + self.config.rotation.settle_delay());
        info!("Wall shuffled");
    }

    fn stop_rotation(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        self.resume_rotation_at = None;
    }

    /// Starts the rotation timer once it is due, and drives the view cycle
    ///
    /// Must be called from within the tokio runtime.
    pub fn poll_timers(&mut self, now: Instant) {
        if self.state == AppState::Wall {
            if self.views.is_due(now) {
                self.next_view(now);
            }
            self.poll_view_step(now);
        }

        let Some(resume_at) = self.resume_rotation_at else {
            return;
        };
        if now < resume_at {
            return;
        }
        self.resume_rotation_at = None;
        let interval = self.rotation_interval();
        self.timer = Some(RotationTimer::spawn(interval));
        debug!(interval_ms = interval.as_millis() as u64, "Rotation started");
    }

    fn poll_view_step(&mut self, now: Instant) {
        if self.views.current() == ViewKind::Grid {
            self.next_view_step_at = None;
            return;
        }
        let step = views::step_interval(self.views.current_spec());
        match self.next_view_step_at {
            None => self.next_view_step_at = Some(now + step),
            Some(due) if now >= due => {
                self.view_step = self.view_step.wrapping_add(1);
                self.next_view_step_at = Some(now + step);
            }
            Some(_) => {}
        }
    }

    /// Products assigned to the current view
    pub fn view_products(&self) -> Vec<Arc<Product>> {
        self.distribution.products_for(self.views.current())
    }

    pub fn next_view(&mut self, now: Instant) {
        let switch = self.views.next(now);
        // Only moving forward hands the products on.
        self.distribution.view_finished(switch.from);
        self.view_switched(switch);
    }

    pub fn previous_view(&mut self, now: Instant) {
        let switch = self.views.previous(now);
        self.view_switched(switch);
    }

    pub fn switch_view(&mut self, kind: ViewKind, now: Instant) {
        if let Some(switch) = self.views.switch_to(kind, now) {
            self.view_switched(switch);
        }
    }

    fn view_switched(&mut self, switch: ViewSwitch) {
        self.view_step = 0;
        self.next_view_step_at = None;
        let cycle = self.distribution.cycle_info();
        info!(
            from = switch.from.name(),
            to = switch.to.name(),
            products = self.view_products().len(),
            total = cycle.total,
            cycle = cycle.cycle,
            "View switched"
        );
    }

    /// Applies every rotation tick that has arrived since the last call
    ///
    /// Ticks only rotate the grid while it is on screen. Returns how many
    /// rotations were applied.
    pub fn drain_rotation_ticks(&mut self) -> usize {
        let mut ticks = 0;
        while let Some(timer) = self.timer.as_mut() {
            if !timer.try_tick() {
                break;
            }
            ticks += 1;
        }
        if self.views.current() != ViewKind::Grid {
            return 0;
        }
        (0..ticks).filter(|_| self.rotate_once()).count()
    }

    /// Runs a single rotation step; `true` if a slot was replaced
    pub fn rotate_once(&mut self) -> bool {
        match self.engine.rotate() {
            RotationOutcome::Replaced {
                slot,
                incoming,
                outgoing,
                ..
            } => {
                debug!(slot, incoming, outgoing, "Rotated");
                true
            }
            RotationOutcome::Skipped(reason) => {
                debug!(?reason, "Rotation skipped");
                false
            }
        }
    }

    /// Handles keyboard input and updates state accordingly
    ///
    /// # Key Bindings
    /// - `q` or `Esc`: Quit the application
    /// - `s`: Shuffle the wall
    /// - `Space`: Rotate one slot (development mode)
    /// - `r`: Refresh product data
    /// - `c`: Clear every cache
    /// - `v`: Ask the cache worker for its version
    /// - `n` or `Right`, `p` or `Left`: Next / previous view
    /// - `1`, `2`, `3`: Marquee, grid, slideshow
    /// - `a`: Toggle automatic view switching
    /// - `?`: Toggle help
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Handle help overlay - intercepts all keys when shown
        if self.show_help {
            match key_event.code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
                    self.show_help = false;
                }
                _ => {} // Ignore other keys when help is shown
            }
            return;
        }

        match self.state {
            AppState::Loading => {
                // Only quit is allowed during loading
                if key_event.code == KeyCode::Char('q') {
                    self.should_quit = true;
                }
            }
            AppState::Error(_) => match key_event.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Char('r') => {
                    self.refresh_requested = true;
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
            AppState::Wall => match key_event.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Char('s') => {
                    self.shuffle();
                }
                KeyCode::Char(' ') if self.dev_mode => {
                    self.rotate_once();
                }
                KeyCode::Char('r') => {
                    self.refresh_requested = true;
                }
                KeyCode::Char('c') => {
                    self.clear_cache_requested = true;
                }
                KeyCode::Char('v') => {
                    self.version_requested = true;
                }
                KeyCode::Char('n') | KeyCode::Right => {
                    self.next_view(Instant::now());
                }
                KeyCode::Char('p') | KeyCode::Left => {
                    self.previous_view(Instant::now());
                }
                KeyCode::Char('1') => self.switch_view(ViewKind::Marquee, Instant::now()),
                KeyCode::Char('2') => self.switch_view(ViewKind::Grid, Instant::now()),
                KeyCode::Char('3') => self.switch_view(ViewKind::Slideshow, Instant::now()),
                KeyCode::Char('a') => {
                    let enabled = self.views.toggle_auto_switch(Instant::now());
                    self.status_message = Some(if enabled {
                        "Auto view switching on".to_string()
                    } else {
                        "Auto view switching off".to_string()
                    });
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
        }
    }

    /// Carries out pending requests against the background services
    pub async fn process_requests(&mut self, services: &Services) {
        if std::mem::take(&mut self.refresh_requested) {
            self.status_message = Some("Refreshing...".to_string());
            services.refresh.request_refresh();
        }

        if std::mem::take(&mut self.clear_cache_requested) {
            services.worker.request(WorkerMessage::ClearCache).await;
            self.precache = None;
            self.status_message = Some("Caches cleared".to_string());
        }

        if std::mem::take(&mut self.version_requested) {
            self.cache_version = services.worker.version().await;
            if self.cache_version.is_none() {
                warn!("Cache worker did not report a version");
            }
        }

        if let Some(products) = self.pending_cache.take() {
            if let Some(precacher) = &services.precacher {
                spawn_precache(precacher.clone(), products.clone(), services.refresh.sender());
            }
            services
                .worker
                .post(WorkerMessage::CacheProducts { products })
                .await;
        }
    }
}

/// Warms the image cache in the background, reporting progress to the loop
fn spawn_precache(
    precacher: ImagePrecacher,
    products: Vec<Product>,
    sender: tokio::sync::mpsc::Sender<RefreshMessage>,
) {
    tokio::spawn(async move {
        precacher
            .cache_product_images(&products, |status| {
                let _ = sender.try_send(RefreshMessage::PrecacheProgress(status));
            })
            .await;
    });
}
