//! Activity summary tests
//!
//! Seeds the attempt history directly and verifies both the aggregation
//! window and the rendered HTML delivered through the notifier.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use portal_sentinel::{
    Account, AppConfig, AttemptOutcome, AttemptRecord, Database, MonitorService,
    SummaryAggregator,
};

use crate::support::{account, test_config, BrokenFactory, FixedRecognizer, RecordingNotifier};

fn seed(db: &Database, account_id: &str, hours_ago: i64, outcome: AttemptOutcome, status: Option<&str>) {
    db.append_attempt(&AttemptRecord {
        timestamp: Utc::now() - Duration::hours(hours_ago),
        account_id: account_id.to_string(),
        outcome,
        status: status.map(str::to_string),
    })
    .unwrap();
}

fn monitor(config: Arc<AppConfig>, db: Database, notifier: Arc<RecordingNotifier>) -> MonitorService {
    MonitorService::new(
        config,
        db,
        Arc::new(BrokenFactory),
        notifier,
        Arc::new(FixedRecognizer("123456")),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_summary_window_and_totals_over_real_history() {
    let accounts: Vec<Account> = vec![account("VIS-001"), account("VIS-002")];
    let db = Database::new_in_memory().unwrap();

    // Outside the 12h window.
    seed(&db, "VIS-001", 13, AttemptOutcome::CaptureFailed, None);
    // Inside the window.
    seed(&db, "VIS-001", 5, AttemptOutcome::Success, Some("APROBADO - listo"));
    seed(&db, "VIS-001", 1, AttemptOutcome::Success, Some("APROBADO - listo"));
    seed(&db, "VIS-002", 2, AttemptOutcome::ServerRejectedChallenge, None);

    let aggregator = SummaryAggregator::new(db);
    let report = aggregator.summarize(&accounts, 12).unwrap();

    assert_eq!(report.totals.accounts, 2);
    assert_eq!(report.totals.attempts, 3);
    assert_eq!(report.totals.errors, 1);
    assert!(report
        .rows
        .iter()
        .all(|row| row.timestamp >= report.window_start));
}

#[tokio::test]
async fn test_summary_delivery_renders_seeded_history() {
    let accounts = vec![account("VIS-001")];
    let config = test_config(accounts);
    let db = Database::new_in_memory().unwrap();
    seed(&db, "VIS-001", 3, AttemptOutcome::Success, Some("APROBADO - listo"));
    seed(&db, "VIS-001", 2, AttemptOutcome::RecognitionFailed, None);

    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = monitor(config, db, Arc::clone(&notifier));
    monitor.deliver_summary().await;

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.address, "summary@example.com");
    assert!(message.is_html);
    assert!(message.subject.contains("Monitoring summary"));
    assert!(message.body.contains("APROBADO - listo"));
    assert!(message.body.contains("Holder VIS-001"));
    assert!(message.body.contains("Attempts: 2"));
    assert!(message.body.contains("Errors: 1"));
}

#[tokio::test]
async fn test_summary_delivery_with_empty_history_sends_placeholder() {
    let accounts = vec![account("VIS-001")];
    let config = test_config(accounts);
    let db = Database::new_in_memory().unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = monitor(config, db, Arc::clone(&notifier));
    monitor.deliver_summary().await;

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].body.contains("No activity recorded"));
}
