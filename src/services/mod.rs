//! Services
//!
//! Business logic services for the monitor daemon.
//! Services implement challenge resolution, portal automation, polling,
//! scheduling, aggregation and notification delivery.

pub mod captcha;
pub mod monitor;
pub mod notify;
pub mod poll;
pub mod portal;
pub mod scheduler;
pub mod summary;

pub use captcha::{ChallengeResolver, CommandRecognizer, DigitRecognizer, RecognitionResult};
pub use monitor::MonitorService;
pub use notify::{NotificationDispatcher, NotifyError};
pub use poll::AccountPoller;
pub use scheduler::CycleScheduler;
pub use summary::{SummaryAggregator, SummaryReport};
