//! Application Settings
//!
//! Configuration model for the monitor daemon. Every tunable has a serde
//! default so a minimal config file only needs the account list and the
//! notification destination.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::account::Account;

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// URL of the portal's lookup page.
    #[serde(default = "default_portal_url")]
    pub portal_url: String,

    /// Accounts to monitor. Ids must be unique; the scheduler relies on
    /// this to guarantee no two executions for the same id run at once.
    pub accounts: Vec<Account>,

    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Minutes between polling cycles.
    #[serde(default = "default_cycle_interval_minutes")]
    pub cycle_interval_minutes: u64,

    /// Hours between activity summary deliveries.
    #[serde(default = "default_summary_interval_hours")]
    pub summary_interval_hours: u64,

    /// Size of the summary window in hours.
    #[serde(default = "default_summary_window_hours")]
    pub summary_window_hours: i64,

    /// Retry ceiling per account per cycle.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum concurrently running account executions. Bounds the number
    /// of live browser sessions held at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Bounded wait for a page element to become ready, in seconds.
    #[serde(default = "default_element_timeout_secs")]
    pub element_timeout_secs: u64,

    /// Grace period for in-flight workers on shutdown, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    #[serde(default)]
    pub recognition: RecognitionTuning,

    #[serde(default)]
    pub backoff: BackoffTuning,

    #[serde(default)]
    pub notifications: NotifyConfig,
}

/// Challenge recognition tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionTuning {
    /// Exact number of digits a valid candidate must contain.
    #[serde(default = "default_expected_digits")]
    pub expected_digits: usize,

    /// Integer upscale factor applied before recognition.
    #[serde(default = "default_upscale_factor")]
    pub upscale_factor: u32,

    /// Linear contrast gain applied around mid-gray.
    #[serde(default = "default_contrast_gain")]
    pub contrast_gain: f32,

    /// Binarization intensity threshold.
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// External OCR program invoked on the preprocessed bitmap.
    #[serde(default = "default_ocr_command")]
    pub ocr_command: String,
}

impl Default for RecognitionTuning {
    fn default() -> Self {
        Self {
            expected_digits: default_expected_digits(),
            upscale_factor: default_upscale_factor(),
            contrast_gain: default_contrast_gain(),
            threshold: default_threshold(),
            ocr_command: default_ocr_command(),
        }
    }
}

/// Retry backoff tuning. Delays are expressed in whole units so tests can
/// shrink the unit to milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffTuning {
    /// Duration of one backoff unit in milliseconds.
    #[serde(default = "default_backoff_unit_ms")]
    pub unit_ms: u64,

    /// Jitter range for local capture/recognition misses, in units.
    #[serde(default = "default_local_min_units")]
    pub local_min_units: u64,
    #[serde(default = "default_local_max_units")]
    pub local_max_units: u64,

    /// Jitter range for server-side challenge rejections, in units.
    #[serde(default = "default_server_min_units")]
    pub server_min_units: u64,
    #[serde(default = "default_server_max_units")]
    pub server_max_units: u64,

    /// Cap on the extra units added per consecutive server rejection.
    #[serde(default = "default_server_growth_cap")]
    pub server_growth_cap: u64,
}

impl Default for BackoffTuning {
    fn default() -> Self {
        Self {
            unit_ms: default_backoff_unit_ms(),
            local_min_units: default_local_min_units(),
            local_max_units: default_local_max_units(),
            server_min_units: default_server_min_units(),
            server_max_units: default_server_max_units(),
            server_growth_cap: default_server_growth_cap(),
        }
    }
}

/// Outbound notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook endpoint that relays subject/body messages.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Fallback destination for accounts without an override.
    #[serde(default)]
    pub default_address: Option<String>,

    /// Destination for the periodic activity summary.
    #[serde(default)]
    pub summary_address: Option<String>,
}

impl AppConfig {
    /// Validate the configuration.
    ///
    /// Returns a human-readable message on the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.accounts.is_empty() {
            return Err("no accounts configured".to_string());
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.id.trim().is_empty() {
                return Err("account id must not be empty".to_string());
            }
            if !seen.insert(account.id.as_str()) {
                return Err(format!("duplicate account id: {}", account.id));
            }
        }

        if self.cycle_interval_minutes == 0 {
            return Err("cycle_interval_minutes must be at least 1".to_string());
        }
        if self.summary_interval_hours == 0 {
            return Err("summary_interval_hours must be at least 1".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }
        if self.summary_window_hours <= 0 {
            return Err("summary_window_hours must be positive".to_string());
        }
        if self.backoff.local_min_units > self.backoff.local_max_units
            || self.backoff.server_min_units > self.backoff.server_max_units
        {
            return Err("backoff ranges must be ordered min <= max".to_string());
        }

        Ok(())
    }
}

fn default_portal_url() -> String {
    "https://sutramiteconsular.maec.es/".to_string()
}

fn default_database_path() -> String {
    "portal-sentinel.db".to_string()
}

fn default_cycle_interval_minutes() -> u64 {
    30
}

fn default_summary_interval_hours() -> u64 {
    12
}

fn default_summary_window_hours() -> i64 {
    12
}

fn default_max_attempts() -> u32 {
    12
}

fn default_max_concurrency() -> usize {
    4
}

fn default_element_timeout_secs() -> u64 {
    15
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_expected_digits() -> usize {
    6
}

fn default_upscale_factor() -> u32 {
    4
}

fn default_contrast_gain() -> f32 {
    4.0
}

fn default_threshold() -> u8 {
    150
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_local_min_units() -> u64 {
    2
}

fn default_local_max_units() -> u64 {
    5
}

fn default_server_min_units() -> u64 {
    4
}

fn default_server_max_units() -> u64 {
    7
}

fn default_server_growth_cap() -> u64 {
    3
}
