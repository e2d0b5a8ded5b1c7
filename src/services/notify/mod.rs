//! Outbound Notifications
//!
//! Dispatcher seam for change alerts and activity summaries. Delivery
//! failures are logged by callers and never raised into the polling path.

pub mod webhook;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::models::account::Account;
use crate::models::settings::NotifyConfig;

pub use webhook::WebhookNotifier;

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Sends a subject/body message to a resolved address.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> Result<(), NotifyError>;
}

/// Resolve the destination address for an account: per-account override
/// first, then the configured default.
pub fn resolve_address<'a>(account: &'a Account, config: &'a NotifyConfig) -> Option<&'a str> {
    account
        .notify_address
        .as_deref()
        .or(config.default_address.as_deref())
}

/// Build the subject and plain-text body for a status notification.
///
/// First contact (no previously observed status) gets a different message
/// than a subsequent change.
pub fn change_message(
    account: &Account,
    status: &str,
    first_contact: bool,
    portal_url: &str,
) -> (String, String) {
    let name = account.display_name();
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S");

    if first_contact {
        (
            format!("[portal-sentinel] {} - Initial status", name),
            format!(
                "This is the first observed status for {}.\n\
                 Status: {}\n\
                 Date: {}\n\
                 Link: {}\n\
                 Monitoring continues.\n",
                name, status, now, portal_url
            ),
        )
    } else {
        (
            format!("[portal-sentinel] {} - Status change: {}", name, status),
            format!(
                "The tracked status for {} has changed.\n\
                 New status: {}\n\
                 Date: {}\n\
                 Link: {}\n",
                name, status, now, portal_url
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(notify_address: Option<&str>) -> Account {
        Account {
            id: "A1".to_string(),
            display_name: Some("Maria".to_string()),
            birth_year: "1990".to_string(),
            notify_address: notify_address.map(str::to_string),
        }
    }

    #[test]
    fn test_resolve_address_prefers_account_override() {
        let config = NotifyConfig {
            default_address: Some("ops@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_address(&account(Some("maria@example.com")), &config),
            Some("maria@example.com")
        );
        assert_eq!(
            resolve_address(&account(None), &config),
            Some("ops@example.com")
        );
    }

    #[test]
    fn test_resolve_address_none_when_unconfigured() {
        assert_eq!(
            resolve_address(&account(None), &NotifyConfig::default()),
            None
        );
    }

    #[test]
    fn test_change_message_first_contact() {
        let (subject, body) =
            change_message(&account(None), "PENDING", true, "https://portal.example/");
        assert!(subject.contains("Initial status"));
        assert!(subject.contains("Maria"));
        assert!(body.contains("PENDING"));
        assert!(body.contains("https://portal.example/"));
    }

    #[test]
    fn test_change_message_subsequent_change() {
        let (subject, body) =
            change_message(&account(None), "APPROVED", false, "https://portal.example/");
        assert!(subject.contains("Status change"));
        assert!(body.contains("APPROVED"));
    }
}
