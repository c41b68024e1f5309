//! Isolation record HTTP handlers.
//!
//! ```text
//! POST  /api/v1/isolations
//! GET   /api/v1/isolations
//! GET   /api/v1/isolations/{id}
//! PATCH /api/v1/isolations/{id}
//! GET   /api/v1/isolations/{id}/duration
//! ```
//!
//! Every route requires a session. Records owned by someone else look
//! exactly like missing ones.

use actix_web::{HttpResponse, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::isolation::{
    ApprovalAction, ApprovalDecision, ApprovalWorkflow, IsolationDuration, IsolationRecord,
    IsolationRecordPatch, IsolationStatus, IsolationStep, StepPatch, VoltageReadings,
};
use crate::domain::ports::{
    CreateIsolationRecordRequest, GetIsolationRecordRequest, UpdateIsolationRecordRequest,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::error::json_error_handler;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, parse_optional_date, parse_optional_status, parse_uuid,
};

/// Request payload for opening a record.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIsolationRecordBody {
    /// Premises address.
    #[schema(example = "14 Mill Lane, Leeds")]
    pub site_address: String,
    /// Circuit being isolated.
    #[schema(example = "Distribution Board 3, Kitchen Ring")]
    pub circuit_description: String,
    /// Board feeding the circuit.
    #[serde(default)]
    pub distribution_board: Option<String>,
    /// Breaker or switch used to isolate.
    #[serde(default)]
    pub isolation_device: Option<String>,
    /// Lock-off device number.
    #[serde(default)]
    pub lock_off_number: Option<String>,
    /// Voltage indicator serial number.
    #[serde(default)]
    pub voltage_detector_serial: Option<String>,
    /// Indicator calibration date, `YYYY-MM-DD`.
    #[serde(default)]
    #[schema(format = "date")]
    pub voltage_detector_calibration_date: Option<String>,
    /// Whether a proving unit was used.
    #[serde(default)]
    pub proving_unit_used: bool,
    /// Risk assessment and method statement reference.
    #[serde(default)]
    pub rams_id: Option<String>,
    /// Permit-to-work reference.
    #[serde(default)]
    pub permit_id: Option<String>,
    /// Photo URLs for the whole isolation.
    #[serde(default)]
    pub photos: Vec<String>,
    /// Person performing the isolation.
    #[serde(default)]
    pub isolator_name: Option<String>,
    /// Isolator signature.
    #[serde(default)]
    pub isolator_signature: Option<String>,
    /// Person verifying the isolation.
    #[serde(default)]
    pub verifier_name: Option<String>,
    /// Verifier signature.
    #[serde(default)]
    pub verifier_signature: Option<String>,
    /// Open the record with a pending approval request.
    #[serde(default)]
    pub requires_approval: bool,
}

/// Change to one checklist step.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepPatchBody {
    /// Checklist position, 1 to 8.
    #[schema(minimum = 1, maximum = 8)]
    pub step_number: u8,
    /// New completion flag.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Evidence photo URL.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Readings taken during the step.
    #[serde(default)]
    pub voltage_readings: Option<VoltageReadings>,
    /// Lock-off device number.
    #[serde(default)]
    pub lock_off_number: Option<String>,
    /// Proving unit serial number.
    #[serde(default)]
    pub proving_unit_serial: Option<String>,
}

impl From<StepPatchBody> for StepPatch {
    fn from(body: StepPatchBody) -> Self {
        Self {
            step_number: body.step_number,
            completed: body.completed,
            photo_url: body.photo_url,
            notes: body.notes,
            voltage_readings: body.voltage_readings,
            lock_off_number: body.lock_off_number,
            proving_unit_serial: body.proving_unit_serial,
        }
    }
}

/// Approval workflow action.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApprovalActionBody {
    /// Ask for approval.
    Request,
    /// Record the approver's decision.
    #[serde(rename_all = "camelCase")]
    Decide {
        /// Person deciding.
        approver_name: String,
        /// Whether the isolation may proceed.
        approved: bool,
        /// Reason, usually given on rejection.
        #[serde(default)]
        comments: Option<String>,
        /// Approver signature.
        signature: String,
    },
}

impl From<ApprovalActionBody> for ApprovalAction {
    fn from(body: ApprovalActionBody) -> Self {
        match body {
            ApprovalActionBody::Request => Self::Request,
            ApprovalActionBody::Decide {
                approver_name,
                approved,
                comments,
                signature,
            } => Self::Decide(ApprovalDecision {
                approver_name,
                approved,
                comments,
                signature,
            }),
        }
    }
}

/// Partial update. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIsolationRecordBody {
    /// Premises address.
    #[serde(default)]
    pub site_address: Option<String>,
    /// Circuit being isolated.
    #[serde(default)]
    pub circuit_description: Option<String>,
    /// Board feeding the circuit.
    #[serde(default)]
    pub distribution_board: Option<String>,
    /// Breaker or switch used to isolate.
    #[serde(default)]
    pub isolation_device: Option<String>,
    /// Lock-off device number.
    #[serde(default)]
    pub lock_off_number: Option<String>,
    /// Voltage indicator serial number.
    #[serde(default)]
    pub voltage_detector_serial: Option<String>,
    /// Indicator calibration date, `YYYY-MM-DD`.
    #[serde(default)]
    #[schema(format = "date")]
    pub voltage_detector_calibration_date: Option<String>,
    /// Whether a proving unit was used.
    #[serde(default)]
    pub proving_unit_used: Option<bool>,
    /// Risk assessment and method statement reference.
    #[serde(default)]
    pub rams_id: Option<String>,
    /// Permit-to-work reference.
    #[serde(default)]
    pub permit_id: Option<String>,
    /// Replacement photo URL list.
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    /// Person performing the isolation.
    #[serde(default)]
    pub isolator_name: Option<String>,
    /// Isolator signature.
    #[serde(default)]
    pub isolator_signature: Option<String>,
    /// Person verifying the isolation.
    #[serde(default)]
    pub verifier_name: Option<String>,
    /// Verifier signature.
    #[serde(default)]
    pub verifier_signature: Option<String>,
    /// Person who restored supply.
    #[serde(default)]
    pub re_energised_by: Option<String>,
    /// Step changes, applied in order.
    #[serde(default)]
    pub steps: Vec<StepPatchBody>,
    /// Approval action to apply.
    #[serde(default)]
    pub approval: Option<ApprovalActionBody>,
    /// Requested lifecycle status.
    #[serde(default)]
    #[schema(example = "isolated")]
    pub status: Option<String>,
}

/// Record representation returned by every endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsolationRecordBody {
    /// Record id.
    #[schema(format = "uuid")]
    pub id: String,
    /// Owner.
    #[schema(format = "uuid")]
    pub user_id: String,
    /// Premises address.
    pub site_address: String,
    /// Circuit being isolated.
    pub circuit_description: String,
    /// Board feeding the circuit.
    pub distribution_board: Option<String>,
    /// Breaker or switch used to isolate.
    pub isolation_device: Option<String>,
    /// Lock-off device number.
    pub lock_off_number: Option<String>,
    /// Voltage indicator serial number.
    pub voltage_detector_serial: Option<String>,
    /// Indicator calibration date, `YYYY-MM-DD`.
    #[schema(format = "date")]
    pub voltage_detector_calibration_date: Option<String>,
    /// Whether a proving unit was used.
    pub proving_unit_used: bool,
    /// Risk assessment and method statement reference.
    pub rams_id: Option<String>,
    /// Permit-to-work reference.
    pub permit_id: Option<String>,
    /// Photo URLs for the whole isolation.
    pub photos: Vec<String>,
    /// The eight-step checklist.
    pub steps: Vec<IsolationStep>,
    /// Lifecycle status.
    pub status: IsolationStatus,
    /// Person performing the isolation.
    pub isolator_name: Option<String>,
    /// Isolator signature.
    pub isolator_signature: Option<String>,
    /// Person verifying the isolation.
    pub verifier_name: Option<String>,
    /// Verifier signature.
    pub verifier_signature: Option<String>,
    /// Person who restored supply.
    pub re_energised_by: Option<String>,
    /// Approval workflow state.
    pub approval: ApprovalWorkflow,
    /// Creation time.
    #[schema(format = "date-time")]
    pub created_at: String,
    /// Last modification time.
    #[schema(format = "date-time")]
    pub updated_at: String,
    /// When isolation was confirmed.
    #[schema(format = "date-time")]
    pub isolation_completed_at: Option<String>,
    /// When supply was restored.
    #[schema(format = "date-time")]
    pub re_energisation_at: Option<String>,
}

impl From<IsolationRecord> for IsolationRecordBody {
    fn from(record: IsolationRecord) -> Self {
        let site = record.site().clone();
        let equipment = record.equipment().clone();
        let documents = record.documents().clone();
        let sign_off = record.sign_off().clone();
        Self {
            id: record.id().to_string(),
            user_id: record.user_id().to_string(),
            site_address: site.site_address,
            circuit_description: site.circuit_description,
            distribution_board: site.distribution_board,
            isolation_device: site.isolation_device,
            lock_off_number: site.lock_off_number,
            voltage_detector_serial: equipment.voltage_detector_serial,
            voltage_detector_calibration_date: equipment
                .voltage_detector_calibration_date
                .map(|date| date.format("%Y-%m-%d").to_string()),
            proving_unit_used: equipment.proving_unit_used,
            rams_id: documents.rams_id,
            permit_id: documents.permit_id,
            photos: documents.photos,
            steps: record.steps().to_vec(),
            status: record.status(),
            isolator_name: sign_off.isolator.name,
            isolator_signature: sign_off.isolator.signature,
            verifier_name: sign_off.verifier.name,
            verifier_signature: sign_off.verifier.signature,
            re_energised_by: sign_off.re_energised_by,
            approval: record.approval().clone(),
            created_at: record.created_at().to_rfc3339(),
            updated_at: record.updated_at().to_rfc3339(),
            isolation_completed_at: record.isolation_completed_at().map(|at| at.to_rfc3339()),
            re_energisation_at: record.re_energisation_at().map(|at| at.to_rfc3339()),
        }
    }
}

fn parse_create_body(
    body: CreateIsolationRecordBody,
    session: &SessionContext,
) -> Result<CreateIsolationRecordRequest, Error> {
    let user_id = session.require_user_id()?;
    Ok(CreateIsolationRecordRequest {
        user_id,
        site_address: body.site_address,
        circuit_description: body.circuit_description,
        distribution_board: body.distribution_board,
        isolation_device: body.isolation_device,
        lock_off_number: body.lock_off_number,
        voltage_detector_serial: body.voltage_detector_serial,
        voltage_detector_calibration_date: parse_optional_date(
            body.voltage_detector_calibration_date,
            FieldName::new("voltageDetectorCalibrationDate"),
        )?,
        proving_unit_used: body.proving_unit_used,
        rams_id: body.rams_id,
        permit_id: body.permit_id,
        photos: body.photos,
        isolator_name: body.isolator_name,
        isolator_signature: body.isolator_signature,
        verifier_name: body.verifier_name,
        verifier_signature: body.verifier_signature,
        requires_approval: body.requires_approval,
    })
}

fn parse_update_body(body: UpdateIsolationRecordBody) -> Result<IsolationRecordPatch, Error> {
    Ok(IsolationRecordPatch {
        site_address: body.site_address,
        circuit_description: body.circuit_description,
        distribution_board: body.distribution_board,
        isolation_device: body.isolation_device,
        lock_off_number: body.lock_off_number,
        voltage_detector_serial: body.voltage_detector_serial,
        voltage_detector_calibration_date: parse_optional_date(
            body.voltage_detector_calibration_date,
            FieldName::new("voltageDetectorCalibrationDate"),
        )?,
        proving_unit_used: body.proving_unit_used,
        rams_id: body.rams_id,
        permit_id: body.permit_id,
        photos: body.photos,
        isolator_name: body.isolator_name,
        isolator_signature: body.isolator_signature,
        verifier_name: body.verifier_name,
        verifier_signature: body.verifier_signature,
        re_energised_by: body.re_energised_by,
        steps: body.steps.into_iter().map(StepPatch::from).collect(),
        approval: body.approval.map(ApprovalAction::from),
        status: parse_optional_status(body.status, FieldName::new("status"))?,
    })
}

fn record_request(
    session: &SessionContext,
    path: &web::Path<String>,
) -> Result<GetIsolationRecordRequest, Error> {
    let user_id = session.require_user_id()?;
    Ok(GetIsolationRecordRequest {
        user_id,
        record_id: parse_uuid(path.as_str(), FieldName::new("id"))?,
    })
}

/// Open a record with a fresh GS38 checklist.
#[utoipa::path(
    post,
    path = "/api/v1/isolations",
    request_body = CreateIsolationRecordBody,
    responses(
        (status = 201, description = "Record created", body = IsolationRecordBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Unauthorized", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["isolations"],
    operation_id = "createIsolationRecord",
    security(("SessionCookie" = []))
)]
#[post("/isolations")]
pub async fn create_isolation_record(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreateIsolationRecordBody>,
) -> ApiResult<HttpResponse> {
    let request = parse_create_body(payload.into_inner(), &session)?;
    let record = state.isolations.create_record(request).await?;
    Ok(HttpResponse::Created().json(IsolationRecordBody::from(record)))
}

/// List the caller's records, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/isolations",
    responses(
        (status = 200, description = "Owned records", body = [IsolationRecordBody]),
        (status = 401, description = "Unauthorized", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["isolations"],
    operation_id = "listIsolationRecords",
    security(("SessionCookie" = []))
)]
#[get("/isolations")]
pub async fn list_isolation_records(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<IsolationRecordBody>>> {
    let user_id = session.require_user_id()?;
    let records = state.isolations_query.list_records(user_id).await?;
    Ok(web::Json(
        records.into_iter().map(IsolationRecordBody::from).collect(),
    ))
}

/// Fetch one owned record.
#[utoipa::path(
    get,
    path = "/api/v1/isolations/{id}",
    params(("id" = String, Path, description = "Record id", format = "uuid")),
    responses(
        (status = 200, description = "Record", body = IsolationRecordBody),
        (status = 400, description = "Invalid id", body = Error),
        (status = 401, description = "Unauthorized", body = Error),
        (status = 404, description = "Not found", body = Error)
    ),
    tags = ["isolations"],
    operation_id = "getIsolationRecord",
    security(("SessionCookie" = []))
)]
#[get("/isolations/{id}")]
pub async fn get_isolation_record(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<IsolationRecordBody>> {
    let request = record_request(&session, &path)?;
    let record = state.isolations_query.get_record(request).await?;
    Ok(web::Json(IsolationRecordBody::from(record)))
}

/// Apply a partial update, step changes, approval action or status change.
///
/// The whole patch is applied or none of it is.
#[utoipa::path(
    patch,
    path = "/api/v1/isolations/{id}",
    params(("id" = String, Path, description = "Record id", format = "uuid")),
    request_body = UpdateIsolationRecordBody,
    responses(
        (status = 200, description = "Updated record", body = IsolationRecordBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Unauthorized", body = Error),
        (status = 404, description = "Not found", body = Error),
        (status = 409, description = "Lifecycle rule violated", body = Error)
    ),
    tags = ["isolations"],
    operation_id = "updateIsolationRecord",
    security(("SessionCookie" = []))
)]
#[patch("/isolations/{id}")]
pub async fn update_isolation_record(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<UpdateIsolationRecordBody>,
) -> ApiResult<web::Json<IsolationRecordBody>> {
    let GetIsolationRecordRequest { user_id, record_id } = record_request(&session, &path)?;
    let patch = parse_update_body(payload.into_inner())?;
    let record = state
        .isolations
        .update_record(UpdateIsolationRecordRequest {
            user_id,
            record_id,
            patch,
        })
        .await?;
    Ok(web::Json(IsolationRecordBody::from(record)))
}

/// Time isolated so far, classified against the eight-hour limit.
#[utoipa::path(
    get,
    path = "/api/v1/isolations/{id}/duration",
    params(("id" = String, Path, description = "Record id", format = "uuid")),
    responses(
        (status = 200, description = "Duration classification", body = IsolationDuration),
        (status = 400, description = "Invalid id", body = Error),
        (status = 401, description = "Unauthorized", body = Error),
        (status = 404, description = "Not found", body = Error)
    ),
    tags = ["isolations"],
    operation_id = "getIsolationDuration",
    security(("SessionCookie" = []))
)]
#[get("/isolations/{id}/duration")]
pub async fn get_isolation_duration(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<IsolationDuration>> {
    let request = record_request(&session, &path)?;
    let duration = state.isolations_query.record_duration(request).await?;
    Ok(web::Json(duration))
}

/// Register every isolation route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(create_isolation_record)
        .service(list_isolation_records)
        .service(get_isolation_duration)
        .service(get_isolation_record)
        .service(update_isolation_record);
}

#[cfg(test)]
#[path = "isolation_records_tests.rs"]
mod tests;
