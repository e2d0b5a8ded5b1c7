//! Full polling cycle tests
//!
//! Drives `CycleScheduler` end to end over scripted portal sessions and
//! verifies the persisted history, the confirmed state and the outbound
//! notifications.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use portal_sentinel::models::settings::RecognitionTuning;
use portal_sentinel::services::notify::NotificationDispatcher;
use portal_sentinel::services::portal::SessionFactory;
use portal_sentinel::{
    AppConfig, AttemptOutcome, ChallengeResolver, CycleScheduler, Database, PollOutcome,
};

use crate::support::{
    account, test_config, BrokenFactory, FixedRecognizer, RecordingNotifier, ScriptedFactory,
};

fn scheduler(
    config: Arc<AppConfig>,
    db: Database,
    factory: Arc<dyn SessionFactory>,
    notifier: Arc<dyn NotificationDispatcher>,
) -> CycleScheduler {
    let resolver = Arc::new(ChallengeResolver::new(
        Arc::new(FixedRecognizer("123456")),
        RecognitionTuning::default(),
    ));
    CycleScheduler::new(
        config,
        db,
        resolver,
        factory,
        notifier,
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_cycle_recovers_from_server_rejections() {
    let accounts = vec![account("VIS-001")];
    let config = test_config(accounts.clone());
    let db = Database::new_in_memory().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let factory = Arc::new(ScriptedFactory::new("Aprobado", "Recoja su visado", 2));

    let scheduler = scheduler(
        config,
        db.clone(),
        factory,
        Arc::clone(&notifier) as Arc<dyn NotificationDispatcher>,
    );
    let results = scheduler.run_cycle(&accounts).await;

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].1,
        PollOutcome::Success("APROBADO - Recoja su visado".to_string())
    );

    // Two rejected attempts then the successful one, in order.
    let history = db
        .history_since("VIS-001", Utc::now() - Duration::hours(1))
        .unwrap();
    let outcomes: Vec<_> = history.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::ServerRejectedChallenge,
            AttemptOutcome::ServerRejectedChallenge,
            AttemptOutcome::Success,
        ]
    );

    assert_eq!(
        db.previous_status("VIS-001").unwrap().as_deref(),
        Some("APROBADO - Recoja su visado")
    );

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].address, "alerts@example.com");
    assert!(messages[0].subject.contains("Initial status"));
    assert!(messages[0].body.contains("APROBADO - Recoja su visado"));
    assert!(!messages[0].is_html);
}

#[tokio::test]
async fn test_session_failure_is_recorded_without_notification() {
    let accounts = vec![account("VIS-002")];
    let config = test_config(accounts.clone());
    let db = Database::new_in_memory().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let scheduler = scheduler(
        config,
        db.clone(),
        Arc::new(BrokenFactory),
        Arc::clone(&notifier) as Arc<dyn NotificationDispatcher>,
    );
    let results = scheduler.run_cycle(&accounts).await;

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].1,
        PollOutcome::Exhausted(AttemptOutcome::NavigationFailed)
    );

    let history = db
        .history_since("VIS-002", Utc::now() - Duration::hours(1))
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, AttemptOutcome::NavigationFailed);

    assert!(db.previous_status("VIS-002").unwrap().is_none());
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn test_status_change_across_cycles_notifies_twice() {
    let accounts = vec![account("VIS-003")];
    let config = test_config(accounts.clone());
    let db = Database::new_in_memory().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let first = scheduler(
        Arc::clone(&config),
        db.clone(),
        Arc::new(ScriptedFactory::new("En tramitación", "Su expediente avanza", 0)),
        Arc::clone(&notifier) as Arc<dyn NotificationDispatcher>,
    );
    first.run_cycle(&accounts).await;
    // Same status again: must stay silent.
    first.run_cycle(&accounts).await;

    let second = scheduler(
        config,
        db.clone(),
        Arc::new(ScriptedFactory::new("Aprobado", "Recoja su visado", 0)),
        Arc::clone(&notifier) as Arc<dyn NotificationDispatcher>,
    );
    second.run_cycle(&accounts).await;

    let messages = notifier.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].subject.contains("Initial status"));
    assert!(messages[1].subject.contains("Status change"));
    assert_eq!(
        db.previous_status("VIS-003").unwrap().as_deref(),
        Some("APROBADO - Recoja su visado")
    );
}
