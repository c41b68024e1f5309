//! Tests for isolation record HTTP handlers.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test, web};
use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::domain::ports::{MockIsolationRecordCommand, MockIsolationRecordQuery};
use crate::domain::{IsolationRecordService, UserId};
use crate::inbound::http::test_utils::{login_cookie, test_login_resource, test_session_middleware};
use crate::outbound::memory::InMemoryIsolationRecordRepository;
use crate::test_support::{KITCHEN_RING, MutableClock, fixture_time, started_record};

fn app_with_state(
    state: HttpState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .wrap(test_session_middleware())
        .service(test_login_resource())
        .service(web::scope("/api/v1").configure(configure))
}

fn service_state(clock: Arc<MutableClock>) -> HttpState {
    let service = Arc::new(IsolationRecordService::new(
        Arc::new(InMemoryIsolationRecordRepository::new()),
        clock,
    ));
    HttpState::new(service.clone(), service)
}

fn create_payload() -> Value {
    json!({
        "siteAddress": "14 Mill Lane",
        "circuitDescription": KITCHEN_RING,
        "voltageDetectorCalibrationDate": "2026-01-15",
        "provingUnitUsed": true,
    })
}

fn completing_patch() -> Value {
    let steps: Vec<Value> = (1..=8)
        .map(|step| json!({"stepNumber": step, "completed": true}))
        .collect();
    json!({
        "isolatorName": "Alex Isolator",
        "isolatorSignature": "sig-alex",
        "verifierName": "Sam Verifier",
        "verifierSignature": "sig-sam",
        "steps": steps,
        "status": "isolated",
    })
}

fn body_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

#[rstest]
#[case("/api/v1/isolations")]
#[case("/api/v1/isolations/6f1c2d3e-4a5b-4c6d-8e7f-8091a2b3c4d5")]
#[case("/api/v1/isolations/6f1c2d3e-4a5b-4c6d-8e7f-8091a2b3c4d5/duration")]
#[actix_web::test]
async fn reads_without_session_are_unauthorised(#[case] uri: &str) {
    let app = actix_test::init_service(app_with_state(HttpState::new(
        Arc::new(MockIsolationRecordCommand::new()),
        Arc::new(MockIsolationRecordQuery::new()),
    )))
    .await;

    let res = actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request())
        .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body_str(&body, "code"), Some("unauthorized"));
}

#[actix_web::test]
async fn create_without_session_is_unauthorised() {
    let app = actix_test::init_service(app_with_state(HttpState::new(
        Arc::new(MockIsolationRecordCommand::new()),
        Arc::new(MockIsolationRecordQuery::new()),
    )))
    .await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/isolations")
            .set_json(create_payload())
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn create_returns_fresh_checklist() {
    let clock = Arc::new(MutableClock::new(fixture_time()));
    let app = actix_test::init_service(app_with_state(service_state(clock))).await;
    let cookie = login_cookie(&app, UserId::random()).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/isolations")
            .cookie(cookie)
            .set_json(create_payload())
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body_str(&body, "status"), Some("in_progress"));
    assert_eq!(body_str(&body, "circuitDescription"), Some(KITCHEN_RING));
    assert_eq!(
        body_str(&body, "voltageDetectorCalibrationDate"),
        Some("2026-01-15")
    );
    let steps = body
        .get("steps")
        .and_then(Value::as_array)
        .expect("steps array");
    assert_eq!(steps.len(), 8);
    assert!(
        steps
            .iter()
            .all(|step| step.get("completed") == Some(&json!(false)))
    );
    assert_eq!(
        steps.first().and_then(|step| body_str(step, "title")),
        Some("Identify Circuit")
    );
}

#[rstest]
#[case(json!({"siteAddress": "  ", "circuitDescription": KITCHEN_RING}), "siteAddress")]
#[case(
    json!({
        "siteAddress": "14 Mill Lane",
        "circuitDescription": KITCHEN_RING,
        "voltageDetectorCalibrationDate": "15/01/2026",
    }),
    "voltageDetectorCalibrationDate"
)]
#[actix_web::test]
async fn create_rejects_invalid_fields(#[case] payload: Value, #[case] field: &str) {
    let clock = Arc::new(MutableClock::new(fixture_time()));
    let app = actix_test::init_service(app_with_state(service_state(clock))).await;
    let cookie = login_cookie(&app, UserId::random()).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/isolations")
            .cookie(cookie)
            .set_json(payload)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(
        body.get("details").and_then(|details| body_str(details, "field")),
        Some(field)
    );
}

#[actix_web::test]
async fn full_isolation_then_duration_counts_down() {
    let clock = Arc::new(MutableClock::new(fixture_time()));
    let app = actix_test::init_service(app_with_state(service_state(Arc::clone(&clock)))).await;
    let cookie = login_cookie(&app, UserId::random()).await;

    let created: Value = actix_test::call_and_read_body_json(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/isolations")
            .cookie(cookie.clone())
            .set_json(create_payload())
            .to_request(),
    )
    .await;
    let id = body_str(&created, "id").expect("record id").to_owned();

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri(&format!("/api/v1/isolations/{id}"))
            .cookie(cookie.clone())
            .set_json(completing_patch())
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let isolated: Value = actix_test::read_body_json(res).await;
    assert_eq!(body_str(&isolated, "status"), Some("isolated"));
    assert!(body_str(&isolated, "isolationCompletedAt").is_some());

    clock.advance_minutes(7 * 60 + 30);
    let duration: Value = actix_test::call_and_read_body_json(
        &app,
        actix_test::TestRequest::get()
            .uri(&format!("/api/v1/isolations/{id}/duration"))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(duration.get("isExpiring"), Some(&json!(true)));
    assert_eq!(duration.get("isExpired"), Some(&json!(false)));
    assert_eq!(body_str(&duration, "label"), Some("30 min remaining"));
}

#[actix_web::test]
async fn isolating_with_incomplete_steps_conflicts() {
    let clock = Arc::new(MutableClock::new(fixture_time()));
    let app = actix_test::init_service(app_with_state(service_state(clock))).await;
    let cookie = login_cookie(&app, UserId::random()).await;
    let created: Value = actix_test::call_and_read_body_json(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/isolations")
            .cookie(cookie.clone())
            .set_json(create_payload())
            .to_request(),
    )
    .await;
    let id = body_str(&created, "id").expect("record id").to_owned();

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri(&format!("/api/v1/isolations/{id}"))
            .cookie(cookie)
            .set_json(json!({
                "isolatorName": "Alex Isolator",
                "isolatorSignature": "sig-alex",
                "verifierName": "Sam Verifier",
                "verifierSignature": "sig-sam",
                "status": "isolated",
            }))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = actix_test::read_body_json(res).await;
    let details = body.get("details").expect("details");
    assert_eq!(body_str(details, "code"), Some("incomplete_steps"));
    assert_eq!(
        details.get("incompleteSteps"),
        Some(&json!([1, 2, 3, 4, 5, 6, 7, 8]))
    );
}

#[actix_web::test]
async fn foreign_record_is_not_found() {
    let clock = Arc::new(MutableClock::new(fixture_time()));
    let app = actix_test::init_service(app_with_state(service_state(clock))).await;
    let owner_cookie = login_cookie(&app, UserId::random()).await;
    let created: Value = actix_test::call_and_read_body_json(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/isolations")
            .cookie(owner_cookie)
            .set_json(create_payload())
            .to_request(),
    )
    .await;
    let id = body_str(&created, "id").expect("record id").to_owned();

    let stranger_cookie = login_cookie(&app, UserId::random()).await;
    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri(&format!("/api/v1/isolations/{id}"))
            .cookie(stranger_cookie)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[case("/api/v1/isolations/not-a-uuid", json!({}), "id")]
#[case(
    "/api/v1/isolations/6f1c2d3e-4a5b-4c6d-8e7f-8091a2b3c4d5",
    json!({"status": "paused"}),
    "status"
)]
#[actix_web::test]
async fn patch_rejects_malformed_input(
    #[case] uri: &str,
    #[case] payload: Value,
    #[case] field: &str,
) {
    let app = actix_test::init_service(app_with_state(HttpState::new(
        Arc::new(MockIsolationRecordCommand::new()),
        Arc::new(MockIsolationRecordQuery::new()),
    )))
    .await;
    let cookie = login_cookie(&app, UserId::random()).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri(uri)
            .cookie(cookie)
            .set_json(payload)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(
        body.get("details").and_then(|details| body_str(details, "field")),
        Some(field)
    );
}

#[actix_web::test]
async fn patch_forwards_steps_and_approval_to_command() {
    let user = UserId::random();
    let record = started_record(user, fixture_time());
    let record_id = record.id();
    let mut command = MockIsolationRecordCommand::new();
    command
        .expect_update_record()
        .withf(move |request| {
            request.user_id == user
                && request.record_id == record_id
                && request.patch.steps.len() == 1
                && request
                    .patch
                    .steps
                    .first()
                    .is_some_and(|step| step.step_number == 1 && step.completed == Some(true))
                && matches!(
                    &request.patch.approval,
                    Some(ApprovalAction::Decide(decision))
                        if decision.approved && decision.approver_name == "Jo Approver"
                )
        })
        .times(1)
        .return_once(move |_| Ok(record));
    let app = actix_test::init_service(app_with_state(HttpState::new(
        Arc::new(command),
        Arc::new(MockIsolationRecordQuery::new()),
    )))
    .await;
    let cookie = login_cookie(&app, user).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri(&format!("/api/v1/isolations/{record_id}"))
            .cookie(cookie)
            .set_json(json!({
                "steps": [{"stepNumber": 1, "completed": true}],
                "approval": {
                    "action": "decide",
                    "approverName": "Jo Approver",
                    "approved": true,
                    "signature": "sig-jo",
                },
            }))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn list_returns_only_callers_records_newest_first() {
    let clock = Arc::new(MutableClock::new(fixture_time()));
    let app = actix_test::init_service(app_with_state(service_state(Arc::clone(&clock)))).await;
    let cookie = login_cookie(&app, UserId::random()).await;
    let other_cookie = login_cookie(&app, UserId::random()).await;

    for (cookie, circuit) in [
        (&cookie, "Lighting"),
        (&other_cookie, "Shower"),
        (&cookie, "Cooker"),
    ] {
        clock.advance_minutes(5);
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/isolations")
                .cookie(cookie.clone())
                .set_json(json!({"siteAddress": "14 Mill Lane", "circuitDescription": circuit}))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let listed: Vec<Value> = actix_test::call_and_read_body_json(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/isolations")
            .cookie(cookie)
            .to_request(),
    )
    .await;

    let circuits: Vec<_> = listed
        .iter()
        .filter_map(|record| body_str(record, "circuitDescription"))
        .collect();
    assert_eq!(circuits, vec!["Cooker", "Lighting"]);
}

#[actix_web::test]
async fn malformed_create_body_uses_error_envelope() {
    let clock = Arc::new(MutableClock::new(fixture_time()));
    let app = actix_test::init_service(app_with_state(service_state(clock))).await;
    let cookie = login_cookie(&app, UserId::random()).await;

    let res = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/isolations")
            .cookie(cookie)
            .insert_header(("content-type", "application/json"))
            .set_payload(r#"{"siteAddress": "14 Mill Lane""#)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(res).await;
    assert_eq!(body_str(&body, "code"), Some("invalid_request"));
    assert_eq!(
        body.get("details").and_then(|details| body_str(details, "code")),
        Some("invalid_json")
    );
}
