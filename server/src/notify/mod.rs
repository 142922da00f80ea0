//! Best-effort organizer notifications.
//!
//! Moderation never waits on delivery: [`dispatch`] spawns the send and only logs failures.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub mod webhook;

pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Approval,
    Rejection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub event_id: Uuid,
    pub event_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Organizer identity; resolving it to an address is the delivery side's job.
    pub recipient: String,
    pub payload: NotificationPayload,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification channel closed")]
    Closed,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            kind = ?notification.kind,
            recipient = %notification.recipient,
            event_id = %notification.payload.event_id,
            title = %notification.payload.event_title,
            "Notification (log only)"
        );
        Ok(())
    }
}

/// Sends `notification` on a background task.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            warn!(
                kind = ?notification.kind,
                recipient = %notification.recipient,
                event_id = %notification.payload.event_id,
                error = %e,
                "Failed to deliver notification"
            );
        }
    });
}
