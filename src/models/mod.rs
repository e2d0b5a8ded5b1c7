//! Data Models
//!
//! Domain types shared across services and storage.

pub mod account;
pub mod settings;

pub use account::{Account, AccountState, AttemptOutcome, AttemptRecord, PollOutcome};
pub use settings::{AppConfig, BackoffTuning, NotifyConfig, RecognitionTuning};
