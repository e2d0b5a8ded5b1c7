//! Portal Sentinel - Account Status Monitor
//!
//! This library provides the core functionality for the portal-sentinel
//! daemon. It includes:
//! - Challenge (CAPTCHA) resolution with image preprocessing and OCR
//! - Per-account polling with a bounded retry loop and jittered backoff
//! - A bounded-concurrency cycle scheduler with panic isolation
//! - Storage layer (SQLite state and attempt history, JSON config)
//! - State diffing, notification delivery and windowed activity summaries

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export commonly used items
pub use models::account::{Account, AccountState, AttemptOutcome, AttemptRecord, PollOutcome};
pub use models::settings::AppConfig;
pub use services::{ChallengeResolver, CycleScheduler, MonitorService, SummaryAggregator};
pub use storage::{ConfigService, Database};
pub use utils::error::{AppError, AppResult};
