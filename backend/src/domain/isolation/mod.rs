//! Safe isolation records and the GS38 procedure.
//!
//! - [`steps`]: the fixed eight-step checklist and per-step evidence.
//! - [`record`]: the aggregate and its patch pipeline.
//! - [`lifecycle`]: status transitions, step ordering and approval rules.
//! - [`duration`]: the eight-hour timeout classification.

pub mod duration;
pub mod lifecycle;
pub mod record;
pub mod steps;

pub use self::duration::{
    EXPIRING_WINDOW_HOURS, ExpiryThreshold, ISOLATION_TIMEOUT_HOURS, IsolationDuration,
    isolation_duration,
};
pub use self::lifecycle::{LifecycleError, has_required_signatures, transition};
pub use self::record::{
    AlertMarkers, ApprovalAction, ApprovalDecision, ApprovalStatus, ApprovalWorkflow,
    IsolationPatchError, IsolationRecord, IsolationRecordDraft, IsolationRecordPatch,
    IsolationRecordValidationError, IsolationSite, IsolationStatus, SignOff, Signatory,
    StoredIsolationRecord, SupportingDocuments, TestEquipment, UnknownIsolationStatus,
};
pub use self::steps::{
    GS38_STEP_COUNT, GS38_STEPS, Gs38StepTemplate, IsolationStep, StepPatch, VoltageReadings,
    template_for,
};
