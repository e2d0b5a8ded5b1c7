//! Account Polling State Machine
//!
//! Drives one account through the portal lookup under a retry budget:
//! navigate, capture the challenge, recognize it, submit the form, extract
//! the status. Recognition is stochastic, so most failures are retried
//! from the top (the portal must be reloaded; a used challenge cannot be
//! resubmitted) after a jittered backoff. Session-level transport failures
//! abort the run immediately: the session is corrupted and retrying
//! against it would only burn the budget.
//!
//! Every attempt appends exactly one record to the account's history,
//! tagged with the specific failure cause, before the machine proceeds.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::models::account::{Account, AttemptOutcome, AttemptRecord, PollOutcome};
use crate::services::captcha::ChallengeResolver;
use crate::services::portal::{
    PortalSession, ACCOUNT_ID_FIELD, BIRTH_YEAR_FIELD, CAPTCHA_FIELD, CAPTCHA_IMAGE,
    CAPTCHA_MISMATCH, SERVICE_SELECT, SERVICE_VISA_OPTION, STATUS_DESCRIPTION, STATUS_TITLE,
    SUBMIT_BUTTON,
};
use crate::storage::Database;

use super::backoff::{BackoffClass, BackoffPolicy};

/// Named states of the polling machine. `Retry` re-enters at `Start`;
/// `Extracted` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Start,
    Navigated,
    ChallengeCaptured,
    Recognized,
    Submitted,
    Extracted,
    Retry,
    Failed,
}

/// Result of one traversal of the machine.
enum AttemptResult {
    /// Status extracted; carries the full status string.
    Success(String),
    /// Transient failure; re-enter at `Start` after backoff.
    Retry(AttemptOutcome),
    /// Session-level failure; terminal for the whole run.
    Fatal(AttemptOutcome),
}

/// Runs the polling state machine for single accounts.
pub struct AccountPoller {
    resolver: Arc<ChallengeResolver>,
    db: Database,
    backoff: BackoffPolicy,
    portal_url: String,
    max_attempts: u32,
    shutdown: CancellationToken,
}

impl AccountPoller {
    pub fn new(
        resolver: Arc<ChallengeResolver>,
        db: Database,
        backoff: BackoffPolicy,
        portal_url: impl Into<String>,
        max_attempts: u32,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            db,
            backoff,
            portal_url: portal_url.into(),
            max_attempts,
            shutdown,
        }
    }

    /// Drive the machine until a status is extracted, the retry budget is
    /// exhausted, or the session fails at the transport level.
    pub async fn run(&self, account: &Account, session: &mut dyn PortalSession) -> PollOutcome {
        let mut attempts = 0u32;
        let mut consecutive_rejections = 0u32;
        let mut last_failure = AttemptOutcome::CaptureFailed;

        while attempts < self.max_attempts {
            if self.shutdown.is_cancelled() {
                tracing::info!(
                    account = account.display_name(),
                    "shutdown requested; ending polling run"
                );
                break;
            }

            attempts += 1;
            tracing::info!(
                account = account.display_name(),
                attempt = attempts,
                max = self.max_attempts,
                "starting poll attempt"
            );

            match self.attempt_once(account, session).await {
                AttemptResult::Success(status) => {
                    self.record(account, AttemptOutcome::Success, Some(&status));
                    tracing::info!(
                        account = account.display_name(),
                        status = %status,
                        "status extracted"
                    );
                    return PollOutcome::Success(status);
                }
                AttemptResult::Fatal(outcome) => {
                    self.record(account, outcome, None);
                    tracing::error!(
                        account = account.display_name(),
                        outcome = %outcome,
                        "session-level failure; aborting run"
                    );
                    return PollOutcome::Exhausted(outcome);
                }
                AttemptResult::Retry(outcome) => {
                    self.record(account, outcome, None);
                    last_failure = outcome;

                    let class = if outcome.is_server_rejection() {
                        consecutive_rejections += 1;
                        BackoffClass::Server
                    } else {
                        consecutive_rejections = 0;
                        BackoffClass::Local
                    };

                    if attempts < self.max_attempts {
                        let delay = self.backoff.delay(class, consecutive_rejections);
                        tracing::debug!(
                            account = account.display_name(),
                            outcome = %outcome,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after backoff"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.shutdown.cancelled() => break,
                        }
                    }
                }
            }
        }

        tracing::warn!(
            account = account.display_name(),
            attempts,
            "polling run ended without a status"
        );
        PollOutcome::Exhausted(last_failure)
    }

    /// One traversal: `Start` through `Extracted`, `Retry` or `Failed`.
    async fn attempt_once(
        &self,
        account: &Account,
        session: &mut dyn PortalSession,
    ) -> AttemptResult {
        let mut phase = PollPhase::Start;

        // START -> NAVIGATED. The portal interface only distinguishes
        // loaded from session-corrupt here, so any failure is fatal.
        if let Err(e) = session.navigate(&self.portal_url).await {
            tracing::warn!(account = account.display_name(), "navigation failed: {}", e);
            self.advance(account, &mut phase, PollPhase::Failed);
            return AttemptResult::Fatal(AttemptOutcome::NavigationFailed);
        }
        self.advance(account, &mut phase, PollPhase::Navigated);

        // NAVIGATED -> CHALLENGE_CAPTURED
        let challenge_bytes = match session.capture_element(CAPTCHA_IMAGE).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_fatal() => {
                tracing::warn!(account = account.display_name(), "capture failed: {}", e);
                self.advance(account, &mut phase, PollPhase::Failed);
                return AttemptResult::Fatal(AttemptOutcome::CaptureFailed);
            }
            Err(e) => {
                tracing::debug!(account = account.display_name(), "capture failed: {}", e);
                self.advance(account, &mut phase, PollPhase::Retry);
                return AttemptResult::Retry(AttemptOutcome::CaptureFailed);
            }
        };
        self.advance(account, &mut phase, PollPhase::ChallengeCaptured);

        // CHALLENGE_CAPTURED -> RECOGNIZED. The challenge bytes and any
        // derived bitmap live for exactly this attempt.
        let recognition = match self.resolver.resolve(&challenge_bytes) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(account = account.display_name(), "recognition failed: {}", e);
                self.advance(account, &mut phase, PollPhase::Retry);
                return AttemptResult::Retry(AttemptOutcome::RecognitionFailed);
            }
        };
        drop(challenge_bytes);

        if !recognition.valid {
            self.advance(account, &mut phase, PollPhase::Retry);
            return AttemptResult::Retry(AttemptOutcome::RecognitionFailed);
        }
        self.advance(account, &mut phase, PollPhase::Recognized);

        // RECOGNIZED -> SUBMITTED
        if let Err(e) = self
            .fill_and_submit(account, &recognition.candidate, session)
            .await
        {
            tracing::debug!(
                account = account.display_name(),
                "form interaction failed: {}",
                e
            );
            if e.is_fatal() {
                self.advance(account, &mut phase, PollPhase::Failed);
                return AttemptResult::Fatal(AttemptOutcome::InteractionFailed);
            }
            self.advance(account, &mut phase, PollPhase::Retry);
            return AttemptResult::Retry(AttemptOutcome::InteractionFailed);
        }
        self.advance(account, &mut phase, PollPhase::Submitted);

        // SUBMITTED -> EXTRACTED
        let result = self.extract_status(account, session).await;
        match &result {
            AttemptResult::Success(_) => self.advance(account, &mut phase, PollPhase::Extracted),
            AttemptResult::Retry(_) => self.advance(account, &mut phase, PollPhase::Retry),
            AttemptResult::Fatal(_) => self.advance(account, &mut phase, PollPhase::Failed),
        }
        result
    }

    async fn fill_and_submit(
        &self,
        account: &Account,
        challenge_digits: &str,
        session: &mut dyn PortalSession,
    ) -> Result<(), crate::services::portal::PortalError> {
        session
            .select_option(SERVICE_SELECT, SERVICE_VISA_OPTION)
            .await?;
        session.set_field(ACCOUNT_ID_FIELD, &account.id).await?;
        session
            .set_field(BIRTH_YEAR_FIELD, &account.birth_year)
            .await?;
        session.set_field(CAPTCHA_FIELD, challenge_digits).await?;
        session.click(SUBMIT_BUTTON).await?;
        Ok(())
    }

    /// Read the result fields. Both non-empty means success. The
    /// description is only read once the title rendered; a missing title
    /// already means there is no result, and waiting out a second element
    /// timeout would only delay the mismatch check.
    async fn extract_status(
        &self,
        account: &Account,
        session: &mut dyn PortalSession,
    ) -> AttemptResult {
        let title = match session.read_text(STATUS_TITLE).await {
            Ok(title) => title,
            Err(e) if e.is_fatal() => {
                tracing::warn!(
                    account = account.display_name(),
                    "status extraction failed: {}",
                    e
                );
                return AttemptResult::Fatal(AttemptOutcome::InteractionFailed);
            }
            Err(_) => return self.classify_missing_result(account, session).await,
        };
        if title.trim().is_empty() {
            return self.classify_missing_result(account, session).await;
        }

        match session.read_text(STATUS_DESCRIPTION).await {
            Ok(description) if !description.trim().is_empty() => {
                let status = format!(
                    "{} - {}",
                    title.trim().to_uppercase(),
                    description.trim()
                );
                AttemptResult::Success(status)
            }
            Err(e) if e.is_fatal() => {
                tracing::warn!(
                    account = account.display_name(),
                    "status extraction failed: {}",
                    e
                );
                AttemptResult::Fatal(AttemptOutcome::InteractionFailed)
            }
            _ => self.classify_missing_result(account, session).await,
        }
    }

    /// No result rendered: an explicit mismatch indicator means the
    /// challenge digits were simply wrong; a bare timeout is treated the
    /// same way as any other transient interaction failure, since the
    /// server does not always distinguish them reliably.
    async fn classify_missing_result(
        &self,
        account: &Account,
        session: &mut dyn PortalSession,
    ) -> AttemptResult {
        match session.read_text(CAPTCHA_MISMATCH).await {
            Ok(message) if !message.trim().is_empty() => {
                tracing::debug!(
                    account = account.display_name(),
                    message = %message.trim(),
                    "server rejected the challenge"
                );
                AttemptResult::Retry(AttemptOutcome::ServerRejectedChallenge)
            }
            _ => AttemptResult::Retry(AttemptOutcome::InteractionFailed),
        }
    }

    fn advance(&self, account: &Account, phase: &mut PollPhase, next: PollPhase) {
        tracing::trace!(
            account = account.display_name(),
            from = ?phase,
            to = ?next,
            "poll phase transition"
        );
        *phase = next;
    }

    fn record(&self, account: &Account, outcome: AttemptOutcome, status: Option<&str>) {
        let record =
            AttemptRecord::new(account.id.as_str(), outcome, status.map(str::to_string));
        if let Err(e) = self.db.append_attempt(&record) {
            tracing::warn!(
                account = account.display_name(),
                "failed to append attempt record: {}",
                e
            );
        }
    }
}
