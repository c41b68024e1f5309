//! Test utilities for the backend crate.
//!
//! Shared by unit tests in `src/` and integration tests in `tests/`. Only
//! compiled for tests or with the `test-support` feature.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::isolation::{
    GS38_STEPS, IsolationRecord, IsolationRecordDraft, IsolationRecordPatch, IsolationSite,
    IsolationStatus, StepPatch,
};
use crate::domain::ports::{IsolationAlert, IsolationAlertSink, IsolationAlertSinkError};

/// Circuit used by the scenario fixtures.
pub const KITCHEN_RING: &str = "Distribution Board 3, Kitchen Ring";

/// Clock whose instant only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *self.lock_clock() += delta;
    }

    /// Move the clock forward by whole minutes.
    pub fn advance_minutes(&self, minutes: i64) {
        *self.lock_clock() += TimeDelta::minutes(minutes);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Alert sink that keeps every alert it is given.
#[derive(Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<IsolationAlert>>,
    fail: bool,
}

impl RecordingAlertSink {
    /// Sink that records and then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            alerts: Mutex::default(),
            fail: true,
        }
    }

    /// Alerts received so far.
    pub fn alerts(&self) -> Vec<IsolationAlert> {
        match self.alerts.lock() {
            Ok(alerts) => alerts.clone(),
            Err(_) => panic!("alert sink mutex"),
        }
    }
}

#[async_trait]
impl IsolationAlertSink for RecordingAlertSink {
    async fn notify(&self, alert: &IsolationAlert) -> Result<(), IsolationAlertSinkError> {
        match self.alerts.lock() {
            Ok(mut alerts) => alerts.push(alert.clone()),
            Err(_) => panic!("alert sink mutex"),
        }
        if self.fail {
            return Err(IsolationAlertSinkError::delivery("sink offline"));
        }
        Ok(())
    }
}

/// Fixed instant used as "now" by fixtures.
pub fn fixture_time() -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z") {
        Ok(time) => time.with_timezone(&Utc),
        Err(error) => panic!("fixture timestamp: {error}"),
    }
}

/// Fresh in-progress record on the kitchen ring.
pub fn started_record(user_id: UserId, now: DateTime<Utc>) -> IsolationRecord {
    let draft = IsolationRecordDraft {
        id: Uuid::new_v4(),
        user_id,
        site: IsolationSite {
            site_address: "14 Mill Lane".to_owned(),
            circuit_description: KITCHEN_RING.to_owned(),
            ..IsolationSite::default()
        },
        equipment: Default::default(),
        documents: Default::default(),
        sign_off: Default::default(),
        requires_approval: false,
    };
    match IsolationRecord::start(draft, now) {
        Ok(record) => record,
        Err(error) => panic!("fixture draft: {error}"),
    }
}

/// Patch completing every step in order and adding both signatures.
pub fn completed_and_signed_patch() -> IsolationRecordPatch {
    IsolationRecordPatch {
        isolator_name: Some("Alex Isolator".to_owned()),
        isolator_signature: Some("sig-alex".to_owned()),
        verifier_name: Some("Sam Verifier".to_owned()),
        verifier_signature: Some("sig-sam".to_owned()),
        steps: GS38_STEPS
            .iter()
            .map(|template| StepPatch {
                step_number: template.step_number,
                completed: Some(true),
                ..StepPatch::default()
            })
            .collect(),
        ..IsolationRecordPatch::default()
    }
}

/// Record confirmed isolated at `isolated_at`.
pub fn isolated_record(user_id: UserId, isolated_at: DateTime<Utc>) -> IsolationRecord {
    let mut record = started_record(user_id, isolated_at);
    let patch = IsolationRecordPatch {
        status: Some(IsolationStatus::Isolated),
        ..completed_and_signed_patch()
    };
    if let Err(error) = record.apply_patch(patch, isolated_at) {
        panic!("fixture isolation: {error}");
    }
    record
}
