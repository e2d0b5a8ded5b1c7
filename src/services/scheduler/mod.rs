//! Cycle Scheduler
//!
//! Bounded-concurrency executor for polling cycles. One worker task per
//! account, gated by a semaphore sized to the configured concurrency limit
//! so the number of live browser sessions stays capped. `run_cycle`
//! returns only after every worker has reached a terminal state; a panic
//! in one account's worker is caught and reported as an exhausted result
//! for that account alone.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::models::account::{Account, AttemptOutcome, AttemptRecord, PollOutcome};
use crate::models::settings::AppConfig;
use crate::services::captcha::ChallengeResolver;
use crate::services::notify::{change_message, resolve_address, NotificationDispatcher};
use crate::services::poll::{AccountPoller, BackoffPolicy};
use crate::services::portal::SessionFactory;
use crate::storage::Database;

/// Everything one worker execution needs, cheap to clone per task.
#[derive(Clone)]
struct WorkerContext {
    config: Arc<AppConfig>,
    db: Database,
    resolver: Arc<ChallengeResolver>,
    sessions: Arc<dyn SessionFactory>,
    notifier: Arc<dyn NotificationDispatcher>,
    shutdown: CancellationToken,
}

/// Runs one bounded parallel polling pass over all accounts.
pub struct CycleScheduler {
    context: WorkerContext,
}

impl CycleScheduler {
    pub fn new(
        config: Arc<AppConfig>,
        db: Database,
        resolver: Arc<ChallengeResolver>,
        sessions: Arc<dyn SessionFactory>,
        notifier: Arc<dyn NotificationDispatcher>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context: WorkerContext {
                config,
                db,
                resolver,
                sessions,
                notifier,
                shutdown,
            },
        }
    }

    /// Execute one polling cycle over the given accounts.
    ///
    /// Account ids are unique (enforced at configuration load), so no two
    /// executions for the same id can run concurrently within a cycle;
    /// cycles themselves never overlap because the caller awaits this
    /// method before scheduling the next one.
    pub async fn run_cycle(&self, accounts: &[Account]) -> Vec<(String, PollOutcome)> {
        let bound = self.context.config.max_concurrency;
        tracing::info!(
            accounts = accounts.len(),
            concurrency = bound,
            "starting polling cycle"
        );

        let semaphore = Arc::new(Semaphore::new(bound));
        let mut tasks: JoinSet<(String, PollOutcome)> = JoinSet::new();

        for account in accounts.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let context = self.context.clone();
            tasks.spawn(async move {
                // The semaphore lives for the whole cycle; acquire cannot
                // observe it closed.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("cycle semaphore closed");

                let account_id = account.id.clone();
                let outcome = poll_account(context, account).await;
                (account_id, outcome)
            });
        }

        let mut results = Vec::with_capacity(accounts.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!("cycle task failed to join: {}", e),
            }
        }

        let successes = results.iter().filter(|(_, o)| o.is_success()).count();
        tracing::info!(
            total = results.len(),
            successes,
            "polling cycle completed"
        );
        results
    }
}

/// One account's full worker execution: acquire a session, run the polling
/// machine, release the session, then diff/persist/notify on success.
async fn poll_account(context: WorkerContext, account: Account) -> PollOutcome {
    let mut session = match context.sessions.create_session().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(
                account = account.display_name(),
                "cannot acquire portal session: {}",
                e
            );
            let record =
                AttemptRecord::new(account.id.as_str(), AttemptOutcome::NavigationFailed, None);
            if let Err(e) = context.db.append_attempt(&record) {
                tracing::warn!(
                    account = account.display_name(),
                    "failed to append attempt record: {}",
                    e
                );
            }
            return PollOutcome::Exhausted(AttemptOutcome::NavigationFailed);
        }
    };

    let poller = AccountPoller::new(
        Arc::clone(&context.resolver),
        context.db.clone(),
        BackoffPolicy::new(context.config.backoff.clone()),
        context.config.portal_url.clone(),
        context.config.max_attempts,
        context.shutdown.clone(),
    );

    // The session must be released on every exit path, so a panic inside
    // the run is caught here, the session closed, and the panic reported
    // as an exhausted result for this account alone.
    let result = AssertUnwindSafe(poller.run(&account, session.as_mut()))
        .catch_unwind()
        .await;
    session.close().await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!(
                account = account.display_name(),
                "worker panicked during polling run"
            );
            return PollOutcome::Exhausted(AttemptOutcome::InteractionFailed);
        }
    };

    if let PollOutcome::Success(status) = &outcome {
        apply_status(&context, &account, status).await;
    }

    outcome
}

/// Compare the freshly extracted status to the last confirmed one and,
/// on change or first contact, overwrite the state record and alert.
async fn apply_status(context: &WorkerContext, account: &Account, status: &str) {
    let previous = match context.db.previous_status(&account.id) {
        Ok(previous) => previous,
        Err(e) => {
            tracing::error!(
                account = account.display_name(),
                "cannot load previous status: {}",
                e
            );
            return;
        }
    };

    let first_contact = previous.is_none();
    if previous.as_deref() == Some(status) {
        tracing::info!(
            account = account.display_name(),
            status = %status,
            "status unchanged"
        );
        return;
    }

    if let Err(e) = context.db.record_status(&account.id, status) {
        tracing::error!(
            account = account.display_name(),
            "cannot persist status: {}",
            e
        );
    }

    let Some(address) = resolve_address(account, &context.config.notifications) else {
        tracing::warn!(
            account = account.display_name(),
            "no notification address configured; skipping alert"
        );
        return;
    };

    let (subject, body) =
        change_message(account, status, first_contact, &context.config.portal_url);
    match context.notifier.send(address, &subject, &body, false).await {
        Ok(()) => tracing::info!(
            account = account.display_name(),
            address = %address,
            "change notification sent"
        ),
        Err(e) => tracing::error!(
            account = account.display_name(),
            "notification delivery failed: {}",
            e
        ),
    }
}
