//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::isolation_records;

/// Row struct for reading from the isolation_records table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = isolation_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct IsolationRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub site_address: String,
    pub circuit_description: String,
    pub distribution_board: Option<String>,
    pub isolation_device: Option<String>,
    pub lock_off_number: Option<String>,
    pub voltage_detector_serial: Option<String>,
    pub voltage_detector_calibration_date: Option<NaiveDate>,
    pub proving_unit_used: bool,
    pub rams_id: Option<String>,
    pub permit_id: Option<String>,
    pub photos: serde_json::Value,
    pub steps: serde_json::Value,
    pub status: String,
    pub isolator_name: Option<String>,
    pub isolator_signature: Option<String>,
    pub verifier_name: Option<String>,
    pub verifier_signature: Option<String>,
    pub re_energised_by: Option<String>,
    pub approval: serde_json::Value,
    pub expiring_alerted_at: Option<DateTime<Utc>>,
    pub expired_alerted_at: Option<DateTime<Utc>>,
    pub isolation_completed_at: Option<DateTime<Utc>>,
    pub re_energisation_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating isolation records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = isolation_records)]
pub(crate) struct NewIsolationRecordRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub site_address: &'a str,
    pub circuit_description: &'a str,
    pub distribution_board: Option<&'a str>,
    pub isolation_device: Option<&'a str>,
    pub lock_off_number: Option<&'a str>,
    pub voltage_detector_serial: Option<&'a str>,
    pub voltage_detector_calibration_date: Option<NaiveDate>,
    pub proving_unit_used: bool,
    pub rams_id: Option<&'a str>,
    pub permit_id: Option<&'a str>,
    pub photos: &'a serde_json::Value,
    pub steps: &'a serde_json::Value,
    pub status: &'a str,
    pub isolator_name: Option<&'a str>,
    pub isolator_signature: Option<&'a str>,
    pub verifier_name: Option<&'a str>,
    pub verifier_signature: Option<&'a str>,
    pub re_energised_by: Option<&'a str>,
    pub approval: &'a serde_json::Value,
    pub expiring_alerted_at: Option<DateTime<Utc>>,
    pub expired_alerted_at: Option<DateTime<Utc>>,
    pub isolation_completed_at: Option<DateTime<Utc>>,
    pub re_energisation_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset for overwriting a record.
///
/// Owner, creation time, and alert markers are not part of the changeset;
/// markers are only written through `mark_alerted`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = isolation_records)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct IsolationRecordUpdate<'a> {
    pub site_address: &'a str,
    pub circuit_description: &'a str,
    pub distribution_board: Option<&'a str>,
    pub isolation_device: Option<&'a str>,
    pub lock_off_number: Option<&'a str>,
    pub voltage_detector_serial: Option<&'a str>,
    pub voltage_detector_calibration_date: Option<NaiveDate>,
    pub proving_unit_used: bool,
    pub rams_id: Option<&'a str>,
    pub permit_id: Option<&'a str>,
    pub photos: &'a serde_json::Value,
    pub steps: &'a serde_json::Value,
    pub status: &'a str,
    pub isolator_name: Option<&'a str>,
    pub isolator_signature: Option<&'a str>,
    pub verifier_name: Option<&'a str>,
    pub verifier_signature: Option<&'a str>,
    pub re_energised_by: Option<&'a str>,
    pub approval: &'a serde_json::Value,
    pub isolation_completed_at: Option<DateTime<Utc>>,
    pub re_energisation_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
