//! Regression coverage for the expiry monitor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::TimeDelta;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{IsolationRecordRepositoryError, MockIsolationRecordRepository};
use crate::test_support::{
    KITCHEN_RING, MutableClock, RecordingAlertSink, fixture_time, isolated_record, started_record,
};

struct Harness {
    monitor: ExpiryMonitor,
    sink: Arc<RecordingAlertSink>,
}

fn harness(
    repo: MockIsolationRecordRepository,
    sink: RecordingAlertSink,
    config: ExpiryMonitorConfig,
) -> Harness {
    let sink = Arc::new(sink);
    let monitor = ExpiryMonitor::new(
        ExpiryMonitorPorts {
            records: Arc::new(repo),
            alerts: Arc::clone(&sink) as Arc<dyn IsolationAlertSink>,
            clock: Arc::new(MutableClock::new(fixture_time())),
        },
        config,
    );
    Harness { monitor, sink }
}

#[fixture]
fn session_harness() -> Harness {
    harness(
        MockIsolationRecordRepository::new(),
        RecordingAlertSink::default(),
        ExpiryMonitorConfig::default(),
    )
}

fn durable_config() -> ExpiryMonitorConfig {
    ExpiryMonitorConfig {
        dedup: WarningDedup::Durable,
        ..ExpiryMonitorConfig::default()
    }
}

#[rstest]
#[tokio::test]
async fn repeated_checks_announce_once(session_harness: Harness) {
    let record = isolated_record(UserId::random(), fixture_time());
    let now = fixture_time() + TimeDelta::minutes(8 * 60 + 30);

    let first = session_harness.monitor.check_records(&[record.clone()], now).await;
    let second = session_harness.monitor.check_records(&[record], now).await;

    assert_eq!(first.alerts_sent, 1);
    assert_eq!(second.alerts_sent, 0);
    assert_eq!(session_harness.sink.alerts().len(), 1);
}

#[rstest]
#[tokio::test]
async fn already_expired_record_only_gets_critical_alert(session_harness: Harness) {
    let record = isolated_record(UserId::random(), fixture_time());
    let now = fixture_time() + TimeDelta::minutes(8 * 60 + 30);

    session_harness.monitor.check_records(&[record], now).await;

    let alerts = session_harness.sink.alerts();
    let [alert] = alerts.as_slice() else {
        panic!("expected one alert, got {alerts:?}");
    };
    assert_eq!(alert.threshold, ExpiryThreshold::Expired);
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert!(alert.description.contains(KITCHEN_RING));
    assert!(alert.description.contains("9h (limit 8h)"));
}

#[rstest]
#[tokio::test]
async fn expiring_then_expired_announces_both(session_harness: Harness) {
    let record = isolated_record(UserId::random(), fixture_time());
    let records = [record];

    session_harness
        .monitor
        .check_records(&records, fixture_time() + TimeDelta::minutes(7 * 60 + 30))
        .await;
    session_harness
        .monitor
        .check_records(&records, fixture_time() + TimeDelta::minutes(7 * 60 + 45))
        .await;
    session_harness
        .monitor
        .check_records(&records, fixture_time() + TimeDelta::hours(8))
        .await;

    let alerts = session_harness.sink.alerts();
    let severities: Vec<_> = alerts.iter().map(|alert| alert.severity).collect();
    assert_eq!(
        severities,
        vec![AlertSeverity::Warning, AlertSeverity::Critical]
    );
    assert!(
        alerts
            .first()
            .is_some_and(|alert| alert.description.contains("30 min remaining"))
    );
}

#[rstest]
#[tokio::test]
async fn in_progress_records_are_ignored(session_harness: Harness) {
    let record = started_record(UserId::random(), fixture_time());

    let summary = session_harness
        .monitor
        .check_records(&[record], fixture_time() + TimeDelta::hours(30))
        .await;

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.alerts_sent, 0);
    assert!(session_harness.sink.alerts().is_empty());
}

#[rstest]
#[tokio::test]
async fn durable_policy_persists_markers() {
    let record = isolated_record(UserId::random(), fixture_time());
    let record_id = record.id();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_mark_alerted()
        .withf(move |id, threshold, _| *id == record_id && *threshold == ExpiryThreshold::Expiring)
        .times(1)
        .return_once(|_, _, _| Ok(()));
    let h = harness(repo, RecordingAlertSink::default(), durable_config());

    h.monitor
        .check_records(&[record], fixture_time() + TimeDelta::minutes(7 * 60 + 10))
        .await;

    assert_eq!(h.sink.alerts().len(), 1);
}

#[rstest]
#[tokio::test]
async fn durable_markers_silence_a_fresh_monitor() {
    let mut record = isolated_record(UserId::random(), fixture_time());
    record.mark_alerted(ExpiryThreshold::Expired, fixture_time() + TimeDelta::hours(8));
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_mark_alerted().times(0);
    let h = harness(repo, RecordingAlertSink::default(), durable_config());

    let summary = h
        .monitor
        .check_records(&[record], fixture_time() + TimeDelta::hours(9))
        .await;

    assert_eq!(summary.alerts_sent, 0);
    assert!(h.sink.alerts().is_empty());
}

#[rstest]
#[tokio::test]
async fn session_policy_never_writes_markers() {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_mark_alerted().times(0);
    let h = harness(
        repo,
        RecordingAlertSink::default(),
        ExpiryMonitorConfig::default(),
    );
    let record = isolated_record(UserId::random(), fixture_time());

    h.monitor
        .check_records(&[record], fixture_time() + TimeDelta::hours(9))
        .await;

    assert_eq!(h.sink.alerts().len(), 1);
}

#[rstest]
#[tokio::test]
async fn marker_failure_does_not_block_alert() {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_mark_alerted()
        .return_once(|_, _, _| Err(IsolationRecordRepositoryError::connection("down")));
    let h = harness(repo, RecordingAlertSink::default(), durable_config());
    let record = isolated_record(UserId::random(), fixture_time());

    let summary = h
        .monitor
        .check_records(&[record], fixture_time() + TimeDelta::hours(9))
        .await;

    assert_eq!(summary.alerts_sent, 1);
    assert_eq!(h.sink.alerts().len(), 1);
}

#[rstest]
#[tokio::test]
async fn sink_failure_does_not_abort_scan() {
    let h = harness(
        MockIsolationRecordRepository::new(),
        RecordingAlertSink::failing(),
        ExpiryMonitorConfig::default(),
    );
    let records = [
        isolated_record(UserId::random(), fixture_time()),
        isolated_record(UserId::random(), fixture_time()),
    ];

    let summary = h
        .monitor
        .check_records(&records, fixture_time() + TimeDelta::hours(9))
        .await;

    assert_eq!(summary.alerts_sent, 2);
    assert_eq!(h.sink.alerts().len(), 2);
}

#[rstest]
#[tokio::test]
async fn load_failure_is_reported_without_alerts() {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_list_by_status()
        .return_once(|_, _| Err(IsolationRecordRepositoryError::query("boom")));
    let h = harness(
        repo,
        RecordingAlertSink::default(),
        ExpiryMonitorConfig::default(),
    );

    let summary = h.monitor.run_check().await;

    assert!(summary.load_failed);
    assert!(h.sink.alerts().is_empty());
}

#[rstest]
#[tokio::test]
async fn records_leaving_isolation_are_forgotten() {
    let record = isolated_record(UserId::random(), fixture_time() - TimeDelta::hours(9));
    let loads = Arc::new(AtomicUsize::new(0));
    let mut repo = MockIsolationRecordRepository::new();
    let counter = Arc::clone(&loads);
    repo.expect_list_by_status().returning(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(vec![record.clone()])
        } else {
            Ok(Vec::new())
        }
    });
    let h = harness(
        repo,
        RecordingAlertSink::default(),
        ExpiryMonitorConfig::default(),
    );

    assert_eq!(h.monitor.run_check().await.alerts_sent, 1);
    assert_eq!(h.monitor.ledger.len(), 1);

    let summary = h.monitor.run_check().await;

    assert_eq!(summary.scanned, 0);
    assert_eq!(h.monitor.ledger.len(), 0);
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn owner_scope_restricts_working_set() {
    let owner = UserId::random();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_list_by_status()
        .withf(move |status, scope| *status == IsolationStatus::Isolated && *scope == Some(owner))
        .times(1)
        .return_once(|_, _| Ok(Vec::new()));
    let h = harness(
        repo,
        RecordingAlertSink::default(),
        ExpiryMonitorConfig {
            scope: MonitorScope::Owner(owner),
            ..ExpiryMonitorConfig::default()
        },
    );

    let summary = h.monitor.run_check().await;

    assert_eq!(summary, CheckSummary::default());
}

#[rstest]
#[case("session", WarningDedup::Session)]
#[case(" Durable ", WarningDedup::Durable)]
fn dedup_policy_parses(#[case] raw: &str, #[case] expected: WarningDedup) {
    assert_eq!(raw.parse::<WarningDedup>(), Ok(expected));
}

#[test]
fn unknown_dedup_policy_is_rejected() {
    assert!("forever".parse::<WarningDedup>().is_err());
}

fn counting_repo(calls: &Arc<AtomicUsize>) -> MockIsolationRecordRepository {
    let calls = Arc::clone(calls);
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_list_by_status().returning(move |_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    });
    repo
}

#[tokio::test(start_paused = true)]
async fn loop_checks_immediately_then_every_interval() {
    let calls = Arc::new(AtomicUsize::new(0));
    let h = harness(
        counting_repo(&calls),
        RecordingAlertSink::default(),
        ExpiryMonitorConfig::default(),
    );

    let handle = h.monitor.spawn();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(DEFAULT_MONITOR_INTERVAL).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    handle.shutdown().await;
    tokio::time::sleep(DEFAULT_MONITOR_INTERVAL * 5).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let h = harness(
        counting_repo(&calls),
        RecordingAlertSink::default(),
        ExpiryMonitorConfig::default(),
    );

    let handle = h.monitor.spawn();
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(handle);
    tokio::time::sleep(DEFAULT_MONITOR_INTERVAL * 3).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_is_clamped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let h = harness(
        counting_repo(&calls),
        RecordingAlertSink::default(),
        ExpiryMonitorConfig {
            interval: Duration::ZERO,
            ..ExpiryMonitorConfig::default()
        },
    );

    let handle = h.monitor.spawn();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    handle.shutdown().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
