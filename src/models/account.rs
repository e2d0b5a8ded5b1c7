//! Account Domain Types
//!
//! Core data types for monitored accounts: per-run account configuration,
//! attempt outcomes, the append-only attempt history entry, the live
//! per-account state record, and the terminal result of one polling run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One monitored lookup identity. Owned by configuration, read-only to the
/// polling core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Opaque lookup key, unique across the configured account list.
    pub id: String,
    /// Human-readable name used in logs and notifications.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Birth year submitted alongside the lookup key.
    pub birth_year: String,
    /// Per-account notification address override.
    #[serde(default)]
    pub notify_address: Option<String>,
}

impl Account {
    /// The name shown in logs, subjects and summaries. Falls back to the
    /// lookup key when no display name is configured.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Classified outcome of a single traversal of the polling state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// A status string was extracted.
    Success,
    /// The portal page could not be loaded (session-level failure).
    NavigationFailed,
    /// The challenge image could not be captured.
    CaptureFailed,
    /// The recognized candidate failed digit-width validation.
    RecognitionFailed,
    /// A form element was missing or the result never rendered.
    InteractionFailed,
    /// The server explicitly rejected the submitted challenge digits.
    ServerRejectedChallenge,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether this failure was diagnosed by the server rather than locally.
    /// Server-side rejections back off longer between retries.
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, Self::ServerRejectedChallenge)
    }

    /// Parse from a database string representation.
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "navigation_failed" => Some(Self::NavigationFailed),
            "capture_failed" => Some(Self::CaptureFailed),
            "recognition_failed" => Some(Self::RecognitionFailed),
            "interaction_failed" => Some(Self::InteractionFailed),
            "server_rejected_challenge" => Some(Self::ServerRejectedChallenge),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NavigationFailed => write!(f, "navigation_failed"),
            Self::CaptureFailed => write!(f, "capture_failed"),
            Self::RecognitionFailed => write!(f, "recognition_failed"),
            Self::InteractionFailed => write!(f, "interaction_failed"),
            Self::ServerRejectedChallenge => write!(f, "server_rejected_challenge"),
        }
    }
}

/// Immutable entry in an account's append-only attempt history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    pub account_id: String,
    pub outcome: AttemptOutcome,
    /// Extracted status text; only present on success.
    pub status: Option<String>,
}

impl AttemptRecord {
    /// Create a record stamped with the current wall-clock time.
    pub fn new(account_id: impl Into<String>, outcome: AttemptOutcome, status: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            account_id: account_id.into(),
            outcome,
            status,
        }
    }
}

/// The single live state record for one account. `last_status == None` is
/// the sentinel for "never successfully observed" and drives the
/// first-contact notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub account_id: String,
    pub last_status: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Terminal result of one polling run for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A status string was extracted before the retry budget ran out.
    Success(String),
    /// The run ended without a status; carries the last failure tag.
    Exhausted(AttemptOutcome),
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
