//! Activity Summary Aggregation
//!
//! Windowed, read-only reduction of the attempt history into a structured
//! report: one row per in-window attempt, per account, in chronological
//! order, plus cycle-wide totals.

use chrono::{DateTime, Duration, Utc};

use crate::models::account::{Account, AttemptOutcome};
use crate::storage::Database;
use crate::utils::error::AppResult;

/// One attempt inside the summary window.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub timestamp: DateTime<Utc>,
    pub account_id: String,
    pub display_name: String,
    pub status: Option<String>,
    pub outcome: AttemptOutcome,
}

impl SummaryRow {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Cycle-wide totals for the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryTotals {
    /// Configured account count, including accounts with no in-window
    /// activity.
    pub accounts: usize,
    pub attempts: usize,
    pub errors: usize,
}

/// Structured activity report for one window.
#[derive(Debug, Clone)]
pub struct SummaryReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub rows: Vec<SummaryRow>,
    pub totals: SummaryTotals,
}

/// Builds windowed activity reports from the attempt history.
pub struct SummaryAggregator {
    db: Database,
}

impl SummaryAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Summarize the last `window_hours` hours of attempt history.
    ///
    /// Accounts with no in-window entries contribute no rows but still
    /// count toward `totals.accounts`.
    pub fn summarize(&self, accounts: &[Account], window_hours: i64) -> AppResult<SummaryReport> {
        let window_end = Utc::now();
        let window_start = window_end - Duration::hours(window_hours);

        let mut rows = Vec::new();
        let mut errors = 0usize;

        for account in accounts {
            let history = self.db.history_since(&account.id, window_start)?;
            for record in history {
                if !record.outcome.is_success() {
                    errors += 1;
                }
                rows.push(SummaryRow {
                    timestamp: record.timestamp,
                    account_id: record.account_id,
                    display_name: account.display_name().to_string(),
                    status: record.status,
                    outcome: record.outcome,
                });
            }
        }

        let totals = SummaryTotals {
            accounts: accounts.len(),
            attempts: rows.len(),
            errors,
        };

        Ok(SummaryReport {
            window_start,
            window_end,
            rows,
            totals,
        })
    }
}
