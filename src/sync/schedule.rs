//! Fixed-interval sync scheduler

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use super::{SyncError, SyncReport};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Longest supported interval between runs
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * SECONDS_PER_DAY);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval: Duration,
    /// Run once immediately instead of waiting a full interval
    pub run_on_start: bool,
}

impl ScheduleConfig {
    pub fn every_days(days: u64, run_on_start: bool) -> Self {
        Self {
            interval: Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY)).min(MAX_INTERVAL),
            run_on_start,
        }
    }
}

/// Runs `job` every interval until `shutdown` resolves
///
/// A failed run is logged and the schedule carries on. Returns the number of
/// runs started.
pub async fn run_scheduler<F, Fut, S>(config: ScheduleConfig, mut job: F, shutdown: S) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SyncReport, SyncError>>,
    S: Future<Output = ()>,
{
    let period = config.interval.clamp(Duration::from_millis(1), MAX_INTERVAL);
    let start = if config.run_on_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        interval_hours = period.as_secs() / 3600,
        run_on_start = config.run_on_start,
        "Sync scheduler started"
    );

    let mut runs = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                runs += 1;
                info!(run = runs, "Running scheduled sync");
                match job().await {
                    Ok(report) => info!(products = report.total_products, "Scheduled sync completed"),
                    Err(e) => error!(error = %e, "Scheduled sync failed"),
                }
            }
            _ = &mut shutdown => {
                info!("Sync scheduler shutting down");
                break;
            }
        }
    }
    runs
}
