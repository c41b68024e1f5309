//! Isolation record aggregate.
//!
//! A record is created `in_progress` with a fresh GS38 checklist and is only
//! mutated through [`IsolationRecord::apply_patch`], which routes status and
//! step completion through the lifecycle rules in [`super::lifecycle`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::lifecycle::{self, LifecycleError};
use super::steps::{IsolationStep, StepPatch, matches_gs38_template, new_checklist};
use crate::domain::UserId;

/// Lifecycle status of an isolation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IsolationStatus {
    /// Checklist is being worked through.
    InProgress,
    /// Isolation confirmed; the timeout clock is running.
    Isolated,
    /// Supply restored. Terminal.
    ReEnergised,
    /// Abandoned. Terminal.
    Cancelled,
}

impl IsolationStatus {
    /// Stable storage and wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Isolated => "isolated",
            Self::ReEnergised => "re_energised",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ReEnergised | Self::Cancelled)
    }
}

impl fmt::Display for IsolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown isolation status: {0}")]
pub struct UnknownIsolationStatus(pub String);

impl FromStr for IsolationStatus {
    type Err = UnknownIsolationStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "isolated" => Ok(Self::Isolated),
            "re_energised" => Ok(Self::ReEnergised),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownIsolationStatus(other.to_owned())),
        }
    }
}

/// Approval state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// No approval needed.
    #[default]
    NotRequired,
    /// Waiting for an approver.
    Pending,
    /// Approved; isolation may be confirmed.
    Approved,
    /// Rejected; approval may be requested again.
    Rejected,
}

impl ApprovalStatus {
    /// Stable wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the isolation happens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IsolationSite {
    /// Site address.
    pub site_address: String,
    /// Circuit being isolated.
    pub circuit_description: String,
    /// Distribution board reference.
    pub distribution_board: Option<String>,
    /// Isolation device reference.
    pub isolation_device: Option<String>,
    /// Lock-off number on the isolation device.
    pub lock_off_number: Option<String>,
}

/// Test instruments used during the procedure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestEquipment {
    /// Voltage detector serial number.
    pub voltage_detector_serial: Option<String>,
    /// Voltage detector calibration date.
    pub voltage_detector_calibration_date: Option<NaiveDate>,
    /// Whether a proving unit was used.
    pub proving_unit_used: bool,
}

/// Paperwork attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportingDocuments {
    /// RAMS document id.
    pub rams_id: Option<String>,
    /// Permit-to-work id.
    pub permit_id: Option<String>,
    /// Photo references.
    pub photos: Vec<String>,
}

/// Name and signature of a person signing the record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signatory {
    /// Printed name.
    pub name: Option<String>,
    /// Signature payload.
    pub signature: Option<String>,
}

impl Signatory {
    /// Both name and signature are non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        is_present(self.name.as_deref()) && is_present(self.signature.as_deref())
    }
}

/// Accountability block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignOff {
    /// Electrician performing the isolation.
    pub isolator: Signatory,
    /// Second person verifying it.
    pub verifier: Signatory,
    /// Who restored the supply.
    pub re_energised_by: Option<String>,
}

/// Optional approval workflow, stored as one JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalWorkflow {
    /// Whether confirmation needs approval.
    #[serde(default)]
    pub requires_approval: bool,
    /// Current approval state.
    #[serde(default)]
    pub status: ApprovalStatus,
    /// Approver name.
    #[serde(default)]
    pub approver_name: Option<String>,
    /// When the decision was taken.
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    /// Approver comments.
    #[serde(default)]
    pub comments: Option<String>,
    /// Approver signature.
    #[serde(default)]
    pub signature: Option<String>,
}

/// When each expiry threshold was last announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertMarkers {
    /// Expiring warning sent.
    pub expiring_alerted_at: Option<DateTime<Utc>>,
    /// Expired alert sent.
    pub expired_alerted_at: Option<DateTime<Utc>>,
}

/// Validation failures for record fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IsolationRecordValidationError {
    /// Site address was blank.
    #[error("site address must not be empty")]
    EmptySiteAddress,
    /// Circuit description was blank.
    #[error("circuit description must not be empty")]
    EmptyCircuitDescription,
    /// Stored steps do not match the GS38 template.
    #[error("stored steps do not match the GS38 template")]
    CorruptSteps,
    /// Stored approval state contradicts the approval flag.
    #[error("stored approval state is inconsistent")]
    CorruptApproval,
}

/// Input for [`IsolationRecord::start`].
#[derive(Debug, Clone)]
pub struct IsolationRecordDraft {
    /// Record id.
    pub id: Uuid,
    /// Owner.
    pub user_id: UserId,
    /// Location details.
    pub site: IsolationSite,
    /// Instruments.
    pub equipment: TestEquipment,
    /// Paperwork.
    pub documents: SupportingDocuments,
    /// Initial signatures.
    pub sign_off: SignOff,
    /// Whether approval is needed before confirming isolation.
    pub requires_approval: bool,
}

/// Every persisted column of a record, used to rebuild it from storage.
#[derive(Debug, Clone)]
pub struct StoredIsolationRecord {
    /// Record id.
    pub id: Uuid,
    /// Owner.
    pub user_id: UserId,
    /// Location details.
    pub site: IsolationSite,
    /// Instruments.
    pub equipment: TestEquipment,
    /// Paperwork.
    pub documents: SupportingDocuments,
    /// Checklist.
    pub steps: Vec<IsolationStep>,
    /// Lifecycle status.
    pub status: IsolationStatus,
    /// Signatures.
    pub sign_off: SignOff,
    /// Approval block.
    pub approval: ApprovalWorkflow,
    /// Alert bookkeeping.
    pub alerts: AlertMarkers,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// When isolation was confirmed.
    pub isolation_completed_at: Option<DateTime<Utc>>,
    /// When supply was restored.
    pub re_energisation_at: Option<DateTime<Utc>>,
}

/// Approval decision made by an approver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalDecision {
    /// Approver name.
    pub approver_name: String,
    /// `true` approves, `false` rejects.
    pub approved: bool,
    /// Optional comments.
    pub comments: Option<String>,
    /// Approver signature.
    pub signature: String,
}

/// Approval workflow step requested in a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalAction {
    /// Ask for approval.
    Request,
    /// Record an approver's decision.
    Decide(ApprovalDecision),
}

/// Partial update of a record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsolationRecordPatch {
    /// Site address.
    pub site_address: Option<String>,
    /// Circuit description.
    pub circuit_description: Option<String>,
    /// Distribution board.
    pub distribution_board: Option<String>,
    /// Isolation device.
    pub isolation_device: Option<String>,
    /// Lock-off number.
    pub lock_off_number: Option<String>,
    /// Voltage detector serial.
    pub voltage_detector_serial: Option<String>,
    /// Calibration date.
    pub voltage_detector_calibration_date: Option<NaiveDate>,
    /// Proving unit flag.
    pub proving_unit_used: Option<bool>,
    /// RAMS id.
    pub rams_id: Option<String>,
    /// Permit id.
    pub permit_id: Option<String>,
    /// Replacement photo list.
    pub photos: Option<Vec<String>>,
    /// Isolator name.
    pub isolator_name: Option<String>,
    /// Isolator signature.
    pub isolator_signature: Option<String>,
    /// Verifier name.
    pub verifier_name: Option<String>,
    /// Verifier signature.
    pub verifier_signature: Option<String>,
    /// Who restored the supply.
    pub re_energised_by: Option<String>,
    /// Step changes, applied in order.
    pub steps: Vec<StepPatch>,
    /// Approval workflow action.
    pub approval: Option<ApprovalAction>,
    /// Requested status.
    pub status: Option<IsolationStatus>,
}

/// Failure applying a patch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IsolationPatchError {
    /// A field value is invalid.
    #[error(transparent)]
    Validation(#[from] IsolationRecordValidationError),
    /// A lifecycle rule was violated.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// A GS38 safe isolation record.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationRecord {
    id: Uuid,
    user_id: UserId,
    site: IsolationSite,
    equipment: TestEquipment,
    documents: SupportingDocuments,
    steps: Vec<IsolationStep>,
    status: IsolationStatus,
    sign_off: SignOff,
    approval: ApprovalWorkflow,
    alerts: AlertMarkers,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    isolation_completed_at: Option<DateTime<Utc>>,
    re_energisation_at: Option<DateTime<Utc>>,
}

impl IsolationRecord {
    /// Start a new record with a fresh checklist.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use isolation_backend::domain::UserId;
    /// use isolation_backend::domain::isolation::{
    ///     IsolationRecord, IsolationRecordDraft, IsolationSite, IsolationStatus,
    /// };
    /// use uuid::Uuid;
    ///
    /// let record = IsolationRecord::start(
    ///     IsolationRecordDraft {
    ///         id: Uuid::new_v4(),
    ///         user_id: UserId::random(),
    ///         site: IsolationSite {
    ///             site_address: "12 High Street".into(),
    ///             circuit_description: "Kitchen Ring".into(),
    ///             ..IsolationSite::default()
    ///         },
    ///         equipment: Default::default(),
    ///         documents: Default::default(),
    ///         sign_off: Default::default(),
    ///         requires_approval: false,
    ///     },
    ///     Utc::now(),
    /// )
    /// .expect("valid draft");
    /// assert_eq!(record.status(), IsolationStatus::InProgress);
    /// assert_eq!(record.steps().len(), 8);
    /// ```
    pub fn start(
        draft: IsolationRecordDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, IsolationRecordValidationError> {
        validate_site(&draft.site)?;
        let approval = ApprovalWorkflow {
            requires_approval: draft.requires_approval,
            status: if draft.requires_approval {
                ApprovalStatus::Pending
            } else {
                ApprovalStatus::NotRequired
            },
            ..ApprovalWorkflow::default()
        };
        Ok(Self {
            id: draft.id,
            user_id: draft.user_id,
            site: draft.site,
            equipment: draft.equipment,
            documents: draft.documents,
            steps: new_checklist(),
            status: IsolationStatus::InProgress,
            sign_off: draft.sign_off,
            approval,
            alerts: AlertMarkers::default(),
            created_at: now,
            updated_at: now,
            isolation_completed_at: None,
            re_energisation_at: None,
        })
    }

    /// Rebuild a record from storage, rejecting corrupt checklists.
    pub fn restore(stored: StoredIsolationRecord) -> Result<Self, IsolationRecordValidationError> {
        if !matches_gs38_template(&stored.steps) {
            return Err(IsolationRecordValidationError::CorruptSteps);
        }
        if !stored.approval.requires_approval
            && stored.approval.status != ApprovalStatus::NotRequired
        {
            return Err(IsolationRecordValidationError::CorruptApproval);
        }
        Ok(Self {
            id: stored.id,
            user_id: stored.user_id,
            site: stored.site,
            equipment: stored.equipment,
            documents: stored.documents,
            steps: stored.steps,
            status: stored.status,
            sign_off: stored.sign_off,
            approval: stored.approval,
            alerts: stored.alerts,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            isolation_completed_at: stored.isolation_completed_at,
            re_energisation_at: stored.re_energisation_at,
        })
    }

    /// Record id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Owner.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Location details.
    #[must_use]
    pub fn site(&self) -> &IsolationSite {
        &self.site
    }

    /// Instruments.
    #[must_use]
    pub fn equipment(&self) -> &TestEquipment {
        &self.equipment
    }

    /// Paperwork.
    #[must_use]
    pub fn documents(&self) -> &SupportingDocuments {
        &self.documents
    }

    /// Checklist, always eight steps.
    #[must_use]
    pub fn steps(&self) -> &[IsolationStep] {
        &self.steps
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> IsolationStatus {
        self.status
    }

    /// Signatures.
    #[must_use]
    pub fn sign_off(&self) -> &SignOff {
        &self.sign_off
    }

    /// Approval block.
    #[must_use]
    pub fn approval(&self) -> &ApprovalWorkflow {
        &self.approval
    }

    /// Alert bookkeeping.
    #[must_use]
    pub fn alerts(&self) -> AlertMarkers {
        self.alerts
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last modification time.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// When isolation was confirmed.
    #[must_use]
    pub fn isolation_completed_at(&self) -> Option<DateTime<Utc>> {
        self.isolation_completed_at
    }

    /// When supply was restored.
    #[must_use]
    pub fn re_energisation_at(&self) -> Option<DateTime<Utc>> {
        self.re_energisation_at
    }

    /// Apply a patch atomically.
    ///
    /// Once isolated, sign-off fields may still be corrected but never
    /// blanked. Descriptive fields and signatures merge first, then step changes,
    /// then the approval action, then the status change, so a single patch
    /// can sign the record and confirm isolation. On error the record is
    /// left untouched.
    pub fn apply_patch(
        &mut self,
        patch: IsolationRecordPatch,
        now: DateTime<Utc>,
    ) -> Result<(), IsolationPatchError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::RecordLocked {
                status: self.status,
            }
            .into());
        }

        let mut next = self.clone();
        next.merge_descriptive(&patch)?;
        next.merge_sign_off(&patch);
        if next.status != IsolationStatus::InProgress && !lifecycle::has_required_signatures(&next)
        {
            return Err(LifecycleError::RecordLocked {
                status: next.status,
            }
            .into());
        }
        for step in &patch.steps {
            lifecycle::apply_step_patch(&mut next, step, now)?;
        }
        match patch.approval {
            Some(ApprovalAction::Request) => lifecycle::request_approval(&mut next)?,
            Some(ApprovalAction::Decide(decision)) => {
                lifecycle::decide_approval(&mut next, decision, now)?;
            }
            None => {}
        }
        if let Some(requested) = patch.status {
            next.transition_to(requested, now)?;
        }
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    /// Move to `requested`, stamping the matching timestamp.
    pub fn transition_to(
        &mut self,
        requested: IsolationStatus,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        let status = lifecycle::transition(self, requested)?;
        match status {
            IsolationStatus::Isolated => self.isolation_completed_at = Some(now),
            IsolationStatus::ReEnergised => self.re_energisation_at = Some(now),
            IsolationStatus::InProgress | IsolationStatus::Cancelled => {}
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Note that `threshold`'s alert was announced at `at`.
    pub fn mark_alerted(&mut self, threshold: super::ExpiryThreshold, at: DateTime<Utc>) {
        match threshold {
            super::ExpiryThreshold::Expiring => self.alerts.expiring_alerted_at = Some(at),
            super::ExpiryThreshold::Expired => self.alerts.expired_alerted_at = Some(at),
        }
    }

    /// Whether `threshold` has already been announced.
    #[must_use]
    pub fn was_alerted(&self, threshold: super::ExpiryThreshold) -> bool {
        match threshold {
            super::ExpiryThreshold::Expiring => self.alerts.expiring_alerted_at.is_some(),
            super::ExpiryThreshold::Expired => self.alerts.expired_alerted_at.is_some(),
        }
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [IsolationStep] {
        &mut self.steps
    }

    pub(crate) fn approval_mut(&mut self) -> &mut ApprovalWorkflow {
        &mut self.approval
    }

    fn merge_descriptive(
        &mut self,
        patch: &IsolationRecordPatch,
    ) -> Result<(), IsolationRecordValidationError> {
        let mut site = self.site.clone();
        merge(&mut site.site_address, patch.site_address.as_ref());
        merge(&mut site.circuit_description, patch.circuit_description.as_ref());
        merge_opt(&mut site.distribution_board, patch.distribution_board.as_ref());
        merge_opt(&mut site.isolation_device, patch.isolation_device.as_ref());
        merge_opt(&mut site.lock_off_number, patch.lock_off_number.as_ref());
        validate_site(&site)?;
        self.site = site;

        merge_opt(
            &mut self.equipment.voltage_detector_serial,
            patch.voltage_detector_serial.as_ref(),
        );
        if let Some(date) = patch.voltage_detector_calibration_date {
            self.equipment.voltage_detector_calibration_date = Some(date);
        }
        if let Some(used) = patch.proving_unit_used {
            self.equipment.proving_unit_used = used;
        }

        merge_opt(&mut self.documents.rams_id, patch.rams_id.as_ref());
        merge_opt(&mut self.documents.permit_id, patch.permit_id.as_ref());
        if let Some(photos) = &patch.photos {
            self.documents.photos.clone_from(photos);
        }
        Ok(())
    }

    fn merge_sign_off(&mut self, patch: &IsolationRecordPatch) {
        let sign_off = &mut self.sign_off;
        merge_opt(&mut sign_off.isolator.name, patch.isolator_name.as_ref());
        merge_opt(
            &mut sign_off.isolator.signature,
            patch.isolator_signature.as_ref(),
        );
        merge_opt(&mut sign_off.verifier.name, patch.verifier_name.as_ref());
        merge_opt(
            &mut sign_off.verifier.signature,
            patch.verifier_signature.as_ref(),
        );
        merge_opt(&mut sign_off.re_energised_by, patch.re_energised_by.as_ref());
    }
}

fn merge(target: &mut String, value: Option<&String>) {
    if let Some(value) = value {
        target.clone_from(value);
    }
}

fn merge_opt(target: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

fn validate_site(site: &IsolationSite) -> Result<(), IsolationRecordValidationError> {
    if site.site_address.trim().is_empty() {
        return Err(IsolationRecordValidationError::EmptySiteAddress);
    }
    if site.circuit_description.trim().is_empty() {
        return Err(IsolationRecordValidationError::EmptyCircuitDescription);
    }
    Ok(())
}

pub(crate) fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|text| !text.trim().is_empty())
}
