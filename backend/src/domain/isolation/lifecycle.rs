//! Lifecycle rules for isolation records.
//!
//! ```text
//! in_progress ──► isolated ──► re_energised
//!      │              │
//!      └──────┬───────┘
//!             ▼
//!         cancelled
//! ```
//!
//! [`transition`] is the only way to change status. Step completion is
//! guarded so the GS38 procedure is worked strictly in order.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::record::{
    ApprovalDecision, ApprovalStatus, IsolationRecord, IsolationStatus, is_present,
};
use super::steps::StepPatch;

/// Violations of the lifecycle rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The requested status change is not an edge of the lifecycle.
    #[error("cannot move isolation record from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: IsolationStatus,
        /// Requested status.
        to: IsolationStatus,
    },
    /// Isolator or verifier name or signature is missing.
    #[error("isolator and verifier names and signatures are required")]
    MissingSignatures,
    /// Some checklist steps are still open.
    #[error("steps {incomplete:?} are not complete")]
    IncompleteSteps {
        /// Open step numbers.
        incomplete: Vec<u8>,
    },
    /// Approval is required but not granted.
    #[error("approval is {status}, approval is required before isolating")]
    ApprovalOutstanding {
        /// Current approval state.
        status: ApprovalStatus,
    },
    /// Re-energisation needs a named person.
    #[error("re-energised by must be recorded before re-energising")]
    MissingReEnergisedBy,
    /// A step was completed before an earlier one.
    #[error("step {step} cannot be completed before step {blocking}")]
    OutOfOrderStep {
        /// Step being completed.
        step: u8,
        /// First earlier step still open.
        blocking: u8,
    },
    /// A step was reopened while a later one is complete.
    #[error("step {step} cannot be reopened while step {dependent} is complete")]
    StepStillDependedOn {
        /// Step being reopened.
        step: u8,
        /// First later step still complete.
        dependent: u8,
    },
    /// The step number is outside the checklist.
    #[error("step {step} is not part of the GS38 procedure")]
    UnknownStep {
        /// Offending step number.
        step: u8,
    },
    /// The record no longer accepts this change.
    #[error("isolation record is {status} and cannot be changed")]
    RecordLocked {
        /// Current status.
        status: IsolationStatus,
    },
    /// A decision was submitted without a pending request.
    #[error("approval is {status}, not pending")]
    ApprovalNotPending {
        /// Current approval state.
        status: ApprovalStatus,
    },
    /// Approval cannot be requested from the current state.
    #[error("approval cannot be requested while {status}")]
    ApprovalNotRequestable {
        /// Current approval state.
        status: ApprovalStatus,
    },
    /// Approver name or signature is missing.
    #[error("approver name and signature are required")]
    MissingApprover,
}

impl LifecycleError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::MissingSignatures => "missing_signatures",
            Self::IncompleteSteps { .. } => "incomplete_steps",
            Self::ApprovalOutstanding { .. } => "approval_outstanding",
            Self::MissingReEnergisedBy => "missing_re_energised_by",
            Self::OutOfOrderStep { .. } => "out_of_order_step",
            Self::StepStillDependedOn { .. } => "step_still_depended_on",
            Self::UnknownStep { .. } => "unknown_step",
            Self::RecordLocked { .. } => "record_locked",
            Self::ApprovalNotPending { .. } => "approval_not_pending",
            Self::ApprovalNotRequestable { .. } => "approval_not_requestable",
            Self::MissingApprover => "missing_approver",
        }
    }

    /// Structured details for error payloads.
    #[must_use]
    pub fn details(&self) -> Value {
        let code = self.code();
        match self {
            Self::InvalidTransition { from, to } => {
                json!({ "code": code, "from": from.as_str(), "to": to.as_str() })
            }
            Self::IncompleteSteps { incomplete } => {
                json!({ "code": code, "incompleteSteps": incomplete })
            }
            Self::ApprovalOutstanding { status }
            | Self::ApprovalNotPending { status }
            | Self::ApprovalNotRequestable { status } => {
                json!({ "code": code, "approvalStatus": status.as_str() })
            }
            Self::OutOfOrderStep { step, blocking } => {
                json!({ "code": code, "step": step, "blockingStep": blocking })
            }
            Self::StepStillDependedOn { step, dependent } => {
                json!({ "code": code, "step": step, "dependentStep": dependent })
            }
            Self::UnknownStep { step } => json!({ "code": code, "step": step }),
            Self::RecordLocked { status } => json!({ "code": code, "status": status.as_str() }),
            Self::MissingSignatures | Self::MissingReEnergisedBy | Self::MissingApprover => {
                json!({ "code": code })
            }
        }
    }
}

/// Whether isolator and verifier have both signed.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use isolation_backend::domain::UserId;
/// use isolation_backend::domain::isolation::{
///     IsolationRecord, IsolationRecordDraft, IsolationSite, has_required_signatures,
/// };
/// use uuid::Uuid;
///
/// let record = IsolationRecord::start(
///     IsolationRecordDraft {
///         id: Uuid::new_v4(),
///         user_id: UserId::random(),
///         site: IsolationSite {
///             site_address: "Unit 4".into(),
///             circuit_description: "Lighting".into(),
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
/// assert!(!has_required_signatures(&record));
/// ```
#[must_use]
pub fn has_required_signatures(record: &IsolationRecord) -> bool {
    let sign_off = record.sign_off();
    sign_off.isolator.is_complete() && sign_off.verifier.is_complete()
}

/// Validate a status change and return the resulting status.
///
/// The record is not modified; see [`IsolationRecord::transition_to`].
pub fn transition(
    record: &IsolationRecord,
    requested: IsolationStatus,
) -> Result<IsolationStatus, LifecycleError> {
    use IsolationStatus::{Cancelled, InProgress, Isolated, ReEnergised};

    let from = record.status();
    match (from, requested) {
        (InProgress, Isolated) => {
            let incomplete: Vec<u8> = record
                .steps()
                .iter()
                .filter(|step| !step.completed())
                .map(|step| step.step_number())
                .collect();
            if !incomplete.is_empty() {
                return Err(LifecycleError::IncompleteSteps { incomplete });
            }
            if !has_required_signatures(record) {
                return Err(LifecycleError::MissingSignatures);
            }
            let approval = record.approval();
            if approval.requires_approval && approval.status != ApprovalStatus::Approved {
                return Err(LifecycleError::ApprovalOutstanding {
                    status: approval.status,
                });
            }
            Ok(Isolated)
        }
        (Isolated, ReEnergised) => {
            if !is_present(record.sign_off().re_energised_by.as_deref()) {
                return Err(LifecycleError::MissingReEnergisedBy);
            }
            Ok(ReEnergised)
        }
        (InProgress | Isolated, Cancelled) => Ok(Cancelled),
        (from, to) => Err(LifecycleError::InvalidTransition { from, to }),
    }
}

/// Apply one step patch, enforcing procedure order.
pub(crate) fn apply_step_patch(
    record: &mut IsolationRecord,
    patch: &StepPatch,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    let status = record.status();
    if status.is_terminal() {
        return Err(LifecycleError::RecordLocked { status });
    }

    let number = patch.step_number;
    let position = record
        .steps()
        .iter()
        .position(|step| step.step_number() == number)
        .ok_or(LifecycleError::UnknownStep { step: number })?;

    let currently = record
        .steps()
        .get(position)
        .is_some_and(|step| step.completed());
    let change = patch.completed.filter(|wanted| *wanted != currently);

    if let Some(completed) = change {
        if status != IsolationStatus::InProgress {
            return Err(LifecycleError::RecordLocked { status });
        }
        let (earlier, later) = record.steps().split_at(position);
        if completed {
            if let Some(open) = earlier.iter().find(|step| !step.completed()) {
                return Err(LifecycleError::OutOfOrderStep {
                    step: number,
                    blocking: open.step_number(),
                });
            }
        } else if let Some(done) = later.iter().skip(1).find(|step| step.completed()) {
            return Err(LifecycleError::StepStillDependedOn {
                step: number,
                dependent: done.step_number(),
            });
        }
    }

    if let Some(step) = record.steps_mut().get_mut(position) {
        if let Some(completed) = change {
            step.set_completed(completed, now);
        }
        step.merge_evidence(patch);
    }
    Ok(())
}

/// Put the record into `pending` approval.
pub(crate) fn request_approval(record: &mut IsolationRecord) -> Result<(), LifecycleError> {
    let status = record.status();
    if status != IsolationStatus::InProgress {
        return Err(LifecycleError::RecordLocked { status });
    }
    let approval = record.approval_mut();
    match approval.status {
        ApprovalStatus::NotRequired | ApprovalStatus::Rejected => {
            approval.requires_approval = true;
            approval.status = ApprovalStatus::Pending;
            approval.approver_name = None;
            approval.decided_at = None;
            approval.comments = None;
            approval.signature = None;
            Ok(())
        }
        other => Err(LifecycleError::ApprovalNotRequestable { status: other }),
    }
}

/// Record an approver's decision on a pending request.
pub(crate) fn decide_approval(
    record: &mut IsolationRecord,
    decision: ApprovalDecision,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    let status = record.status();
    if status != IsolationStatus::InProgress {
        return Err(LifecycleError::RecordLocked { status });
    }
    let approval = record.approval_mut();
    if approval.status != ApprovalStatus::Pending {
        return Err(LifecycleError::ApprovalNotPending {
            status: approval.status,
        });
    }
    if !is_present(Some(decision.approver_name.as_str()))
        || !is_present(Some(decision.signature.as_str()))
    {
        return Err(LifecycleError::MissingApprover);
    }
    approval.status = if decision.approved {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Rejected
    };
    approval.approver_name = Some(decision.approver_name);
    approval.signature = Some(decision.signature);
    approval.comments = decision.comments;
    approval.decided_at = Some(now);
    Ok(())
}
