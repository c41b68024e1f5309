//! Driving port for isolation record mutations.
//!
//! Inbound adapters create records and apply partial updates through this
//! port. Every request carries the authenticated owner.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::isolation::{IsolationRecord, IsolationRecordPatch};
use crate::domain::{Error, UserId};

/// Request to open a new isolation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIsolationRecordRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Site address; must not be blank.
    pub site_address: String,
    /// Circuit being isolated; must not be blank.
    pub circuit_description: String,
    /// Distribution board reference.
    pub distribution_board: Option<String>,
    /// Isolation device reference.
    pub isolation_device: Option<String>,
    /// Lock-off number.
    pub lock_off_number: Option<String>,
    /// Voltage detector serial.
    pub voltage_detector_serial: Option<String>,
    /// Voltage detector calibration date.
    pub voltage_detector_calibration_date: Option<NaiveDate>,
    /// Whether a proving unit is used.
    pub proving_unit_used: bool,
    /// RAMS document id.
    pub rams_id: Option<String>,
    /// Permit-to-work id.
    pub permit_id: Option<String>,
    /// Photo references.
    pub photos: Vec<String>,
    /// Isolator name.
    pub isolator_name: Option<String>,
    /// Isolator signature.
    pub isolator_signature: Option<String>,
    /// Verifier name.
    pub verifier_name: Option<String>,
    /// Verifier signature.
    pub verifier_signature: Option<String>,
    /// Whether confirmation needs approval.
    pub requires_approval: bool,
}

impl CreateIsolationRecordRequest {
    /// Request with only the mandatory fields set.
    #[must_use]
    pub fn new(
        user_id: UserId,
        site_address: impl Into<String>,
        circuit_description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            site_address: site_address.into(),
            circuit_description: circuit_description.into(),
            distribution_board: None,
            isolation_device: None,
            lock_off_number: None,
            voltage_detector_serial: None,
            voltage_detector_calibration_date: None,
            proving_unit_used: false,
            rams_id: None,
            permit_id: None,
            photos: Vec::new(),
            isolator_name: None,
            isolator_signature: None,
            verifier_name: None,
            verifier_signature: None,
            requires_approval: false,
        }
    }
}

/// Request to change an owned record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateIsolationRecordRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Record to change.
    pub record_id: Uuid,
    /// Fields to merge.
    pub patch: IsolationRecordPatch,
}

/// Driving port for isolation record write operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IsolationRecordCommand: Send + Sync {
    /// Open a record with a fresh GS38 checklist in `in_progress`.
    ///
    /// Blank site address or circuit description yields
    /// [`crate::domain::ErrorCode::InvalidRequest`].
    async fn create_record(
        &self,
        request: CreateIsolationRecordRequest,
    ) -> Result<IsolationRecord, Error>;

    /// Merge a patch into an owned record and persist it.
    ///
    /// Unknown or foreign records yield [`crate::domain::ErrorCode::NotFound`];
    /// lifecycle violations yield [`crate::domain::ErrorCode::Conflict`].
    async fn update_record(
        &self,
        request: UpdateIsolationRecordRequest,
    ) -> Result<IsolationRecord, Error>;
}
