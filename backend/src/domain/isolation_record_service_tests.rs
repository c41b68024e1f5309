//! Tests for the isolation record service.

use std::sync::Arc;

use chrono::TimeDelta;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::isolation::{IsolationRecordPatch, IsolationStatus, StepPatch};
use crate::domain::ports::MockIsolationRecordRepository;
use crate::test_support::{
    KITCHEN_RING, MutableClock, completed_and_signed_patch, fixture_time, isolated_record,
    started_record,
};

#[fixture]
fn clock() -> Arc<MutableClock> {
    Arc::new(MutableClock::new(fixture_time()))
}

fn service(
    repo: MockIsolationRecordRepository,
    clock: Arc<MutableClock>,
) -> IsolationRecordService<MockIsolationRecordRepository> {
    IsolationRecordService::new(Arc::new(repo), clock)
}

#[rstest]
#[tokio::test]
async fn create_record_persists_fresh_checklist(clock: Arc<MutableClock>) {
    let user_id = UserId::random();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_insert()
        .withf(move |record| {
            record.user_id() == &user_id
                && record.status() == IsolationStatus::InProgress
                && record.steps().iter().all(|step| !step.completed())
        })
        .times(1)
        .return_once(|_| Ok(()));

    let created = service(repo, clock)
        .create_record(CreateIsolationRecordRequest::new(
            user_id,
            "14 Mill Lane",
            KITCHEN_RING,
        ))
        .await
        .expect("create succeeds");

    assert_eq!(created.steps().len(), 8);
    assert_eq!(created.created_at(), fixture_time());
}

#[rstest]
#[case("   ", KITCHEN_RING, "siteAddress")]
#[case("14 Mill Lane", "", "circuitDescription")]
#[tokio::test]
async fn create_record_rejects_blank_required_fields(
    clock: Arc<MutableClock>,
    #[case] site: &str,
    #[case] circuit: &str,
    #[case] field: &str,
) {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_insert().times(0);

    let error = service(repo, clock)
        .create_record(CreateIsolationRecordRequest::new(
            UserId::random(),
            site,
            circuit,
        ))
        .await
        .expect_err("blank field rejected");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert_eq!(
        error.details().and_then(|details| details.get("field")),
        Some(&serde_json::json!(field))
    );
}

#[rstest]
#[tokio::test]
async fn create_record_with_approval_starts_pending(clock: Arc<MutableClock>) {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_insert().return_once(|_| Ok(()));
    let mut request = CreateIsolationRecordRequest::new(UserId::random(), "Plant room", "DB-1");
    request.requires_approval = true;

    let created = service(repo, clock)
        .create_record(request)
        .await
        .expect("create succeeds");

    assert_eq!(
        created.approval().status,
        crate::domain::isolation::ApprovalStatus::Pending
    );
}

#[rstest]
#[case(
    IsolationRecordRepositoryError::connection("refused"),
    ErrorCode::ServiceUnavailable
)]
#[case(IsolationRecordRepositoryError::query("syntax"), ErrorCode::InternalError)]
#[case(IsolationRecordRepositoryError::duplicate(Uuid::nil()), ErrorCode::Conflict)]
#[tokio::test]
async fn create_record_maps_repository_errors(
    clock: Arc<MutableClock>,
    #[case] failure: IsolationRecordRepositoryError,
    #[case] expected: ErrorCode,
) {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_insert().return_once(move |_| Err(failure));

    let error = service(repo, clock)
        .create_record(CreateIsolationRecordRequest::new(
            UserId::random(),
            "14 Mill Lane",
            KITCHEN_RING,
        ))
        .await
        .expect_err("repository failure surfaces");

    assert_eq!(error.code(), expected);
}

#[rstest]
#[tokio::test]
async fn update_record_hides_foreign_records(clock: Arc<MutableClock>) {
    let owner = UserId::random();
    let record = started_record(owner, fixture_time());
    let record_id = record.id();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_find_by_id()
        .return_once(move |_| Ok(Some(record)));
    repo.expect_save().times(0);

    let error = service(repo, clock)
        .update_record(UpdateIsolationRecordRequest {
            user_id: UserId::random(),
            record_id,
            patch: IsolationRecordPatch::default(),
        })
        .await
        .expect_err("foreign record hidden");

    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn update_record_returns_not_found_for_unknown_id(clock: Arc<MutableClock>) {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_find_by_id().return_once(|_| Ok(None));

    let error = service(repo, clock)
        .update_record(UpdateIsolationRecordRequest {
            user_id: UserId::random(),
            record_id: Uuid::new_v4(),
            patch: IsolationRecordPatch::default(),
        })
        .await
        .expect_err("unknown record");

    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn update_record_confirms_isolation_and_stamps_time(clock: Arc<MutableClock>) {
    let owner = UserId::random();
    let record = started_record(owner, fixture_time());
    let record_id = record.id();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_find_by_id()
        .return_once(move |_| Ok(Some(record)));
    repo.expect_save()
        .withf(|saved| saved.status() == IsolationStatus::Isolated)
        .times(1)
        .return_once(|_| Ok(()));
    clock.advance_minutes(20);

    let updated = service(repo, Arc::clone(&clock))
        .update_record(UpdateIsolationRecordRequest {
            user_id: owner,
            record_id,
            patch: IsolationRecordPatch {
                status: Some(IsolationStatus::Isolated),
                ..completed_and_signed_patch()
            },
        })
        .await
        .expect("isolation confirmed");

    let expected = fixture_time() + TimeDelta::minutes(20);
    assert_eq!(updated.isolation_completed_at(), Some(expected));
    assert_eq!(updated.updated_at(), expected);
}

#[rstest]
#[tokio::test]
async fn update_record_maps_lifecycle_violation_to_conflict(clock: Arc<MutableClock>) {
    let owner = UserId::random();
    let record = started_record(owner, fixture_time());
    let record_id = record.id();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_find_by_id()
        .return_once(move |_| Ok(Some(record)));
    repo.expect_save().times(0);

    let error = service(repo, clock)
        .update_record(UpdateIsolationRecordRequest {
            user_id: owner,
            record_id,
            patch: IsolationRecordPatch {
                steps: vec![StepPatch {
                    step_number: 3,
                    completed: Some(true),
                    ..StepPatch::default()
                }],
                ..IsolationRecordPatch::default()
            },
        })
        .await
        .expect_err("out of order step");

    assert_eq!(error.code(), ErrorCode::Conflict);
    assert_eq!(
        error.details().and_then(|details| details.get("code")),
        Some(&serde_json::json!("out_of_order_step"))
    );
}

#[rstest]
#[tokio::test]
async fn list_records_orders_newest_first(clock: Arc<MutableClock>) {
    let owner = UserId::random();
    let older = started_record(owner, fixture_time());
    let newer = started_record(owner, fixture_time() + TimeDelta::hours(1));
    let newer_id = newer.id();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_list_for_user()
        .return_once(move |_| Ok(vec![older, newer]));

    let records = service(repo, clock)
        .list_records(owner)
        .await
        .expect("list succeeds");

    assert_eq!(records.first().map(IsolationRecord::id), Some(newer_id));
}

#[rstest]
#[tokio::test]
async fn record_duration_uses_current_clock(clock: Arc<MutableClock>) {
    let owner = UserId::random();
    let record = isolated_record(owner, fixture_time());
    let record_id = record.id();
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_find_by_id()
        .return_once(move |_| Ok(Some(record)));
    clock.advance_minutes(7 * 60 + 30);

    let duration = service(repo, Arc::clone(&clock))
        .record_duration(GetIsolationRecordRequest {
            user_id: owner,
            record_id,
        })
        .await
        .expect("duration succeeds");

    assert!(duration.is_expiring);
    assert_eq!(duration.label, "30 min remaining");
}

#[rstest]
#[tokio::test]
async fn get_record_maps_connection_failure(clock: Arc<MutableClock>) {
    let mut repo = MockIsolationRecordRepository::new();
    repo.expect_find_by_id()
        .return_once(|_| Err(IsolationRecordRepositoryError::connection("down")));

    let error = service(repo, clock)
        .get_record(GetIsolationRecordRequest {
            user_id: UserId::random(),
            record_id: Uuid::new_v4(),
        })
        .await
        .expect_err("connection failure");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}
