// Notification payloads and the dispatcher seam.
//
// The engine only defines the payload shape and hands it to a `Notifier`;
// delivery (push/voice/text) belongs to an external dispatcher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// The payload emitted for every win, loss, rejection, or failed claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub team_id: String,
    pub message: String,
}

/// Where settlement outcomes are reported. Implementations must not block
/// the batch: a slow or broken dispatcher degrades to a warning.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Forwards notifications to an external dispatcher task over a channel.
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification).await {
            warn!("notification dispatcher unavailable, dropping payload: {e}");
        }
    }
}

/// Logs notifications instead of delivering them. Used for dry runs and as
/// the default when no dispatcher is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) {
        info!(
            team_id = %notification.team_id,
            "notification: {}",
            notification.message
        );
    }
}
