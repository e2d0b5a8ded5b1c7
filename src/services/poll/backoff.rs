//! Retry Backoff Policy
//!
//! Jittered delays between polling attempts. Server-side challenge
//! rejections back off longer than local capture/recognition misses, and
//! grow with consecutive rejections up to a cap.

use std::time::Duration;

use rand::Rng;

use crate::models::settings::BackoffTuning;

/// Failure class driving the backoff range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffClass {
    /// Local capture/recognition miss.
    Local,
    /// Server rejected the submitted challenge.
    Server,
}

/// Computes jittered retry delays from the configured tuning.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    tuning: BackoffTuning,
}

impl BackoffPolicy {
    pub fn new(tuning: BackoffTuning) -> Self {
        Self { tuning }
    }

    /// The delay before the next attempt.
    ///
    /// `consecutive_rejections` only widens the server-class range; the
    /// local class is flat jitter.
    pub fn delay(&self, class: BackoffClass, consecutive_rejections: u32) -> Duration {
        let (min, max) = match class {
            BackoffClass::Local => (self.tuning.local_min_units, self.tuning.local_max_units),
            BackoffClass::Server => {
                let growth =
                    u64::from(consecutive_rejections).min(self.tuning.server_growth_cap);
                (
                    self.tuning.server_min_units + growth,
                    self.tuning.server_max_units + growth,
                )
            }
        };

        let units = rand::thread_rng().gen_range(min..=max);
        Duration::from_millis(units * self.tuning.unit_ms)
    }
}
