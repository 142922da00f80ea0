use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{Notification, NotificationKind, Notifier, NotifyError};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Body posted to the email delivery function.
#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    to: &'a str,
    subject: String,
    html: String,
    #[serde(flatten)]
    notification: &'a Notification,
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render(notification: &Notification) -> (String, String) {
    let title = &notification.payload.event_title;
    let safe_title = escape_html(title);

    match notification.kind {
        NotificationKind::Approval => (
            format!("Your event \"{}\" has been approved", title),
            format!(
                "<p>Your event \"{}\" has been approved and is now listed on the platform.</p>",
                safe_title
            ),
        ),
        NotificationKind::Rejection => {
            let reason = notification
                .payload
                .reason
                .as_deref()
                .map(escape_html)
                .unwrap_or_else(|| "No reason given".to_string());
            (
                format!("Your event \"{}\" needs revision", title),
                format!(
                    "<p>Your event \"{}\" could not be approved: {}</p>\
                     <p>Sign in to your account to edit and resubmit the event.</p>",
                    safe_title, reason
                ),
            )
        }
    }
}

/// Posts notifications as JSON to an HTTP email-delivery endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let (subject, html) = render(notification);
        let body = EmailRequest {
            to: &notification.recipient,
            subject,
            html,
            notification,
        };

        self.client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        debug!(
            recipient = %notification.recipient,
            event_id = %notification.payload.event_id,
            "Notification delivered"
        );
        Ok(())
    }
}
