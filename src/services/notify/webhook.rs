//! Webhook Notification Channel
//!
//! Posts subject/body messages as JSON to a configured relay endpoint
//! (typically a mail gateway or chat bridge).

use async_trait::async_trait;

use super::{NotificationDispatcher, NotifyError};

/// Dispatcher that POSTs notifications to a single webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    fn payload(address: &str, subject: &str, body: &str, is_html: bool) -> serde_json::Value {
        serde_json::json!({
            "address": address,
            "subject": subject,
            "body": body,
            "html": is_html,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::payload(address, subject, body, is_html))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!(
                "relay returned HTTP {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
