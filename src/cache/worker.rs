//! Message-driven control surface for the interceptor
//!
//! Commands arrive over a channel and are applied by a background task, one
//! at a time. Messages use a `type` tag so the same JSON protocol can be fed
//! in from outside the process.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::cache::interceptor::Interceptor;
use crate::data::Product;

/// Commands understood by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerMessage {
    /// Activate the pending version immediately
    SkipWaiting,
    /// Informational flag, recorded and logged only
    DisableImagePreloading,
    /// Store a product payload under the product data key
    CacheProducts { products: Vec<Product> },
    /// Delete every cache
    ClearCache,
    /// Reply with the active version token
    GetVersion,
}

/// Replies sent back for messages that expect one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerReply {
    Version { version: String },
}

struct Envelope {
    message: WorkerMessage,
    reply: Option<oneshot::Sender<WorkerReply>>,
}

/// Handle to the background worker task
///
/// The task stops once every handle is dropped.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<Envelope>,
    interceptor: Arc<Interceptor>,
}

impl WorkerHandle {
    /// Spawns the worker task around `interceptor`
    pub fn spawn(interceptor: Arc<Interceptor>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(16);
        let worker = Arc::clone(&interceptor);

        tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                let reply = handle_message(&worker, envelope.message).await;
                if let (Some(tx), Some(reply)) = (envelope.reply, reply) {
                    let _ = tx.send(reply);
                }
            }
        });

        Self {
            sender,
            interceptor,
        }
    }

    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    /// Sends a message without waiting for it to be applied
    pub async fn post(&self, message: WorkerMessage) {
        let envelope = Envelope {
            message,
            reply: None,
        };
        if self.sender.send(envelope).await.is_err() {
            warn!("Cache worker has stopped, message dropped");
        }
    }

    /// Sends a message and waits until it has been applied
    ///
    /// Returns the reply for messages that have one.
    pub async fn request(&self, message: WorkerMessage) -> Option<WorkerReply> {
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: Some(tx),
        };
        self.sender.send(envelope).await.ok()?;
        rx.await.ok()
    }

    /// Asks the worker for the active version token
    pub async fn version(&self) -> Option<String> {
        match self.request(WorkerMessage::GetVersion).await? {
            WorkerReply::Version { version } => Some(version),
        }
    }
}

async fn handle_message(interceptor: &Interceptor, message: WorkerMessage) -> Option<WorkerReply> {
    match message {
        WorkerMessage::SkipWaiting => {
            if interceptor.skip_waiting().await {
                info!("Pending cache version activated");
            }
            None
        }
        WorkerMessage::DisableImagePreloading => {
            interceptor.set_image_preloading_disabled(true);
            info!("Image preloading disabled");
            None
        }
        WorkerMessage::CacheProducts { products } => {
            if let Err(e) = interceptor.cache_products(&products).await {
                warn!(error = %e, "Failed to cache product payload");
            }
            None
        }
        WorkerMessage::ClearCache => {
            if let Err(e) = interceptor.clear_all().await {
                warn!(error = %e, "Failed to clear caches");
            }
            None
        }
        WorkerMessage::GetVersion => Some(WorkerReply::Version {
            version: interceptor.version().to_string(),
        }),
    }
}
