//! Monitor Service
//!
//! Top-level orchestration: schedules polling cycles and summary
//! deliveries on independent intervals and drives graceful shutdown.
//! Cycles never overlap; the loop awaits each cycle before the next tick
//! is taken, and missed ticks are delayed rather than bursted.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::models::settings::AppConfig;
use crate::services::captcha::{ChallengeResolver, DigitRecognizer};
use crate::services::notify::NotificationDispatcher;
use crate::services::portal::SessionFactory;
use crate::services::scheduler::CycleScheduler;
use crate::services::summary::{render_html, SummaryAggregator};
use crate::storage::Database;
use crate::utils::error::AppResult;

/// Long-running monitor daemon.
pub struct MonitorService {
    config: Arc<AppConfig>,
    scheduler: CycleScheduler,
    aggregator: SummaryAggregator,
    notifier: Arc<dyn NotificationDispatcher>,
    shutdown: CancellationToken,
}

impl MonitorService {
    pub fn new(
        config: Arc<AppConfig>,
        db: Database,
        sessions: Arc<dyn SessionFactory>,
        notifier: Arc<dyn NotificationDispatcher>,
        recognizer: Arc<dyn DigitRecognizer>,
        shutdown: CancellationToken,
    ) -> Self {
        let resolver = Arc::new(ChallengeResolver::new(
            recognizer,
            config.recognition.clone(),
        ));
        let scheduler = CycleScheduler::new(
            Arc::clone(&config),
            db.clone(),
            resolver,
            sessions,
            Arc::clone(&notifier),
            shutdown.clone(),
        );
        let aggregator = SummaryAggregator::new(db);

        Self {
            config,
            scheduler,
            aggregator,
            notifier,
            shutdown,
        }
    }

    /// Run until the shutdown token fires. The first polling cycle starts
    /// immediately; the first summary only after one full summary period.
    pub async fn run(&self) -> AppResult<()> {
        tracing::info!(
            accounts = self.config.accounts.len(),
            cycle_minutes = self.config.cycle_interval_minutes,
            summary_hours = self.config.summary_interval_hours,
            "monitor started"
        );

        let mut poll_tick = tokio::time::interval(Duration::from_secs(
            self.config.cycle_interval_minutes * 60,
        ));
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary_tick = tokio::time::interval(Duration::from_secs(
            self.config.summary_interval_hours * 3600,
        ));
        summary_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Discard the immediate first tick; there is nothing to summarize
        // at startup.
        summary_tick.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("shutdown requested; monitor loop ending");
                    break;
                }
                _ = poll_tick.tick() => {
                    self.run_cycle_once().await;
                }
                _ = summary_tick.tick() => {
                    self.deliver_summary().await;
                }
            }
        }

        Ok(())
    }

    /// Run exactly one polling cycle over the configured accounts.
    pub async fn run_cycle_once(&self) {
        let results = self.scheduler.run_cycle(&self.config.accounts).await;
        for (account_id, outcome) in &results {
            if !outcome.is_success() {
                tracing::warn!(
                    account = %account_id,
                    "cycle ended without a status for this account"
                );
            }
        }
    }

    /// Aggregate the configured window and deliver the rendered report.
    pub async fn deliver_summary(&self) {
        let Some(address) = self.config.notifications.summary_address.as_deref() else {
            tracing::warn!("no summary address configured; skipping summary");
            return;
        };

        let report = match self
            .aggregator
            .summarize(&self.config.accounts, self.config.summary_window_hours)
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("summary aggregation failed: {}", e);
                return;
            }
        };

        let subject = format!(
            "[portal-sentinel] Monitoring summary (last {}h)",
            self.config.summary_window_hours
        );
        let body = render_html(&report);

        match self.notifier.send(address, &subject, &body, true).await {
            Ok(()) => tracing::info!(
                attempts = report.totals.attempts,
                errors = report.totals.errors,
                "summary delivered"
            ),
            Err(e) => tracing::error!("summary delivery failed: {}", e),
        }
    }
}
