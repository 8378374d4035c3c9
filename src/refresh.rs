//! Background product refresh
//!
//! Periodically re-runs the acquisition pipeline in the background and sends
//! the result to the main loop over a tokio channel. A refresh can also be
//! requested on demand.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::acquire::{LoadedProducts, ProductPipeline};
use crate::cache::PrecacheStatus;
use crate::config::RefreshConfig;

/// Messages sent from background tasks to the main app
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// Refresh started
    RefreshStarted,
    /// New product data is available
    ProductsLoaded(LoadedProducts),
    /// Every data source failed
    LoadFailed(String),
    /// Progress of image pre-caching
    PrecacheProgress(PrecacheStatus),
}

/// Handle for controlling the background refresh system
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    sender: mpsc::Sender<RefreshMessage>,
    trigger_tx: mpsc::Sender<()>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Spawns the refresh task around `pipeline`
    ///
    /// With auto refresh disabled the task only serves explicit requests.
    pub fn spawn(pipeline: Arc<ProductPipeline>, config: &RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let enabled = config.enabled && config.interval_minutes > 0;
        let interval = config.interval().max(Duration::from_secs(1));
        let tx = msg_tx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick(), if enabled => {
                        info!("Auto refresh");
                    }
                    Some(()) = trigger_rx.recv() => {
                        info!("Manual refresh");
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }

                let _ = tx.send(RefreshMessage::RefreshStarted).await;
                let message = match pipeline.load().await {
                    Ok(loaded) => RefreshMessage::ProductsLoaded(loaded),
                    Err(e) => {
                        warn!(error = %e, "Refresh failed");
                        RefreshMessage::LoadFailed(e.to_string())
                    }
                };
                if tx.send(message).await.is_err() {
                    break;
                }
            }
        });

        Self {
            receiver: msg_rx,
            sender: msg_tx,
            trigger_tx,
            shutdown_tx,
        }
    }

    /// Requests an immediate refresh
    ///
    /// A request made while one is already pending is coalesced with it.
    pub fn request_refresh(&self) {
        let _ = self.trigger_tx.try_send(());
    }

    /// Sender for other background work reporting to the main loop
    pub fn sender(&self) -> mpsc::Sender<RefreshMessage> {
        self.sender.clone()
    }

    /// Shuts down the background refresh task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Checks for pending refresh messages without blocking
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}
