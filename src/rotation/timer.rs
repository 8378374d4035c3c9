//! Cancellable rotation timer
//!
//! A background task emits a tick every interval. The owner drains ticks on
//! its own loop, so rotations never run concurrently with each other or with
//! a re-initialization. Cancelling (or dropping) the timer stops the task.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

pub struct RotationTimer {
    ticks: mpsc::Receiver<()>,
    shutdown: Option<oneshot::Sender<()>>,
    interval: Duration,
}

impl RotationTimer {
    /// Starts ticking every `interval`; the first tick comes after one interval
    pub fn spawn(interval: Duration) -> Self {
        let (tick_tx, ticks) = mpsc::channel(1);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // A tick the owner hasn't consumed yet is enough; drop extras.
                        if let Err(TrySendError::Closed(_)) = tick_tx.try_send(()) {
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            ticks,
            shutdown: Some(shutdown_tx),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Takes a pending tick without waiting
    pub fn try_tick(&mut self) -> bool {
        self.ticks.try_recv().is_ok()
    }

    /// Waits for the next tick; `None` once the timer has stopped
    pub async fn tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }

    /// Stops the timer; no further ticks are delivered
    pub fn cancel(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.ticks.close();
        while self.ticks.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_none()
    }
}

impl Drop for RotationTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
