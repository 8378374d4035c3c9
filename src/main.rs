//! productwall - rotating product wall for TV screens
//!
//! Without a subcommand this runs the terminal wall: products are loaded
//! through the offline-first pipeline and rotated through a grid sized to
//! the terminal. The `sync` and `schedule` subcommands produce the data files
//! the wall loads.

use std::error::Error;
use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use directories::ProjectDirs;
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};

use productwall::acquire::ProductPipeline;
use productwall::app::{App, AppState, Services};
use productwall::cache::{ImagePrecacher, Interceptor, ProductStore, ResourceCache, WorkerHandle};
use productwall::cli::{self, Cli, Command, SyncArgs};
use productwall::config::{ViewKind, WallConfig};
use productwall::net::{Fetcher, HttpFetcher};
use productwall::refresh::{self, RefreshHandle};
use productwall::{logging, sync, ui};

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Renders the UI based on the current application state
fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    match &app.state {
        AppState::Loading => {
            render_message(frame, "Loading products...", ratatui::style::Color::Cyan);
        }
        AppState::Error(message) => {
            let text = format!("No product data available: {message}  (r to retry, q to quit)");
            render_message(frame, &text, ratatui::style::Color::Red);
        }
        AppState::Wall => match app.views.current() {
            ViewKind::Marquee => ui::render_marquee(frame, app),
            ViewKind::Grid => ui::render_wall(frame, app),
            ViewKind::Slideshow => ui::render_slideshow(frame, app),
        },
    }
    if app.show_help {
        ui::render_help_overlay(frame, app.dev_mode);
    }
}

/// Renders a single centered line
fn render_message(frame: &mut ratatui::Frame, text: &str, color: ratatui::style::Color) {
    use ratatui::{
        layout::{Alignment, Constraint, Direction, Layout},
        style::Style,
        widgets::{Paragraph, Wrap},
    };

    let area = frame.area();

    // Center the message vertically
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(area);

    let paragraph = Paragraph::new(text.to_string())
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, chunks[1]);
}

fn cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "productwall")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("productwall"))
}

/// Builds the interceptor, worker, pipeline and refresh task for the wall
async fn start_services(config: &WallConfig, cache_root: &Path) -> Result<Services, Box<dyn Error>> {
    let network: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.base_url)?);
    let cache = ResourceCache::new(cache_root.join("resources"), config.worker.version.clone());
    let interceptor = Arc::new(Interceptor::new(
        cache.clone(),
        Arc::clone(&network),
        config.worker.clone(),
    ));
    interceptor.install().await;

    let worker = WorkerHandle::spawn(Arc::clone(&interceptor));
    let precacher = (config.worker.enabled && config.precache.enabled)
        .then(|| ImagePrecacher::new(cache, network, config.precache.clone()));

    let store = ProductStore::new(config.acquisition.freshness_window());
    let fetcher: Arc<dyn Fetcher> = interceptor;
    let pipeline = Arc::new(ProductPipeline::new(fetcher, store, config.acquisition.clone()));
    let refresh = RefreshHandle::spawn(pipeline, &config.refresh);
    refresh.request_refresh();

    Ok(Services {
        worker,
        precacher,
        refresh,
    })
}

async fn run_wall(config: WallConfig, dev_mode: bool) -> Result<(), Box<dyn Error>> {
    let cache_root = cache_dir();
    logging::init_file(&cache_root);
    info!(base_url = %config.base_url, dev_mode, "Starting product wall");

    let mut services = start_services(&config, &cache_root).await?;

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let mut app = App::new(config, dev_mode, (size.width, size.height));
    app.version_requested = true;

    // Main event loop
    loop {
        while let Some(message) = refresh::try_recv(&mut services.refresh) {
            app.handle_refresh_message(message);
        }
        app.poll_timers(Instant::now());
        app.drain_rotation_ticks();
        app.process_requests(&services).await;

        // Render UI
        terminal.draw(|f| render_ui(f, &app))?;

        // Poll for input with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key),
                Event::Resize(width, height) => app.handle_resize(width, height),
                _ => {}
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    services.refresh.shutdown().await;
    info!("Product wall stopped");
    Ok(())
}

async fn run_sync_once(args: &SyncArgs) -> Result<(), Box<dyn Error>> {
    logging::init_stderr();
    sync::run_sync(&args.to_config()).await?;
    Ok(())
}

async fn run_schedule(args: &SyncArgs, interval_days: u64, run_on_start: bool) -> Result<(), Box<dyn Error>> {
    logging::init_stderr();
    let config = args.to_config();
    // Fail fast on missing credentials instead of every interval.
    config.validate()?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let runs = sync::run_scheduler(
        cli::schedule_config(interval_days, run_on_start),
        || sync::run_sync(&config),
        shutdown,
    )
    .await;
    info!(runs, "Scheduler stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Sync(args)) => run_sync_once(args).await,
        Some(Command::Schedule {
            sync,
            interval_days,
            run_on_start,
        }) => run_schedule(sync, *interval_days, *run_on_start).await,
        Some(Command::BumpVersion) => {
            let (previous, next) = cli::bump_version(cli.config.as_deref())?;
            println!("Cache version bumped: {previous} -> {next}");
            Ok(())
        }
        Some(Command::Display) | None => {
            let config = cli::load_config(&cli)?;
            run_wall(config, cli.dev).await
        }
    }
}
