//! Account Polling
//!
//! The retry/backoff state machine that drives one account's lookup to a
//! status or a classified terminal failure.

pub mod attempt;
pub mod backoff;

pub use attempt::{AccountPoller, PollPhase};
pub use backoff::{BackoffClass, BackoffPolicy};
