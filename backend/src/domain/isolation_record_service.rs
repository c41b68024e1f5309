//! Isolation record domain service.
//!
//! Implements the isolation record driving ports on top of the repository
//! port. Ownership is enforced here: a record belonging to another user is
//! reported as not found.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::isolation::{
    IsolationDuration, IsolationPatchError, IsolationRecord, IsolationRecordDraft,
    IsolationRecordValidationError, IsolationSite, SignOff, Signatory, SupportingDocuments,
    TestEquipment, isolation_duration,
};
use crate::domain::ports::{
    CreateIsolationRecordRequest, GetIsolationRecordRequest, IsolationRecordCommand,
    IsolationRecordQuery, IsolationRecordRepository, IsolationRecordRepositoryError,
    UpdateIsolationRecordRequest,
};
use crate::domain::{Error, UserId};

fn map_repository_error(error: IsolationRecordRepositoryError) -> Error {
    match error {
        IsolationRecordRepositoryError::Connection { message } => Error::service_unavailable(
            format!("isolation record repository unavailable: {message}"),
        ),
        IsolationRecordRepositoryError::Missing { .. } => {
            Error::not_found("isolation record not found")
        }
        IsolationRecordRepositoryError::Duplicate { id } => {
            Error::conflict(format!("isolation record {id} already exists"))
        }
        IsolationRecordRepositoryError::Query { message }
        | IsolationRecordRepositoryError::Corrupt { message } => {
            Error::internal(format!("isolation record repository error: {message}"))
        }
    }
}

fn map_validation_error(error: &IsolationRecordValidationError) -> Error {
    let field = match error {
        IsolationRecordValidationError::EmptySiteAddress => "siteAddress",
        IsolationRecordValidationError::EmptyCircuitDescription => "circuitDescription",
        IsolationRecordValidationError::CorruptSteps
        | IsolationRecordValidationError::CorruptApproval => {
            return Error::internal(error.to_string());
        }
    };
    Error::invalid_request(error.to_string()).with_details(json!({
        "field": field,
        "code": "required",
    }))
}

fn map_patch_error(error: IsolationPatchError) -> Error {
    match error {
        IsolationPatchError::Validation(err) => map_validation_error(&err),
        IsolationPatchError::Lifecycle(err) => {
            Error::conflict(err.to_string()).with_details(err.details())
        }
    }
}

fn not_found(record_id: Uuid) -> Error {
    Error::not_found(format!("isolation record {record_id} not found"))
}

/// Isolation record service implementing the command and query ports.
pub struct IsolationRecordService<R: ?Sized> {
    records: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ?Sized> Clone for IsolationRecordService<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: ?Sized> IsolationRecordService<R> {
    /// Create a service over `records` using `clock` for timestamps.
    pub fn new(records: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }
}

impl<R> IsolationRecordService<R>
where
    R: IsolationRecordRepository + ?Sized,
{
    async fn load_owned(
        &self,
        user_id: &UserId,
        record_id: Uuid,
    ) -> Result<IsolationRecord, Error> {
        let record = self
            .records
            .find_by_id(&record_id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| not_found(record_id))?;
        if record.user_id() != user_id {
            debug!(%record_id, %user_id, "isolation record owned by another user");
            return Err(not_found(record_id));
        }
        Ok(record)
    }
}

fn draft_from_request(request: CreateIsolationRecordRequest) -> IsolationRecordDraft {
    IsolationRecordDraft {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        site: IsolationSite {
            site_address: request.site_address,
            circuit_description: request.circuit_description,
            distribution_board: request.distribution_board,
            isolation_device: request.isolation_device,
            lock_off_number: request.lock_off_number,
        },
        equipment: TestEquipment {
            voltage_detector_serial: request.voltage_detector_serial,
            voltage_detector_calibration_date: request.voltage_detector_calibration_date,
            proving_unit_used: request.proving_unit_used,
        },
        documents: SupportingDocuments {
            rams_id: request.rams_id,
            permit_id: request.permit_id,
            photos: request.photos,
        },
        sign_off: SignOff {
            isolator: Signatory {
                name: request.isolator_name,
                signature: request.isolator_signature,
            },
            verifier: Signatory {
                name: request.verifier_name,
                signature: request.verifier_signature,
            },
            re_energised_by: None,
        },
        requires_approval: request.requires_approval,
    }
}

#[async_trait]
impl<R> IsolationRecordCommand for IsolationRecordService<R>
where
    R: IsolationRecordRepository + ?Sized,
{
    async fn create_record(
        &self,
        request: CreateIsolationRecordRequest,
    ) -> Result<IsolationRecord, Error> {
        let record = IsolationRecord::start(draft_from_request(request), self.clock.utc())
            .map_err(|err| map_validation_error(&err))?;

        self.records
            .insert(&record)
            .await
            .map_err(map_repository_error)?;

        info!(
            record_id = %record.id(),
            user_id = %record.user_id(),
            circuit = %record.site().circuit_description,
            "isolation record created"
        );
        Ok(record)
    }

    async fn update_record(
        &self,
        request: UpdateIsolationRecordRequest,
    ) -> Result<IsolationRecord, Error> {
        let UpdateIsolationRecordRequest {
            user_id,
            record_id,
            patch,
        } = request;
        let mut record = self.load_owned(&user_id, record_id).await?;
        let previous = record.status();

        record
            .apply_patch(patch, self.clock.utc())
            .map_err(map_patch_error)?;

        self.records
            .save(&record)
            .await
            .map_err(map_repository_error)?;

        if record.status() == previous {
            debug!(%record_id, "isolation record updated");
        } else {
            info!(
                %record_id,
                from = %previous,
                to = %record.status(),
                "isolation record status changed"
            );
        }
        Ok(record)
    }
}

#[async_trait]
impl<R> IsolationRecordQuery for IsolationRecordService<R>
where
    R: IsolationRecordRepository + ?Sized,
{
    async fn list_records(&self, user_id: UserId) -> Result<Vec<IsolationRecord>, Error> {
        let mut records = self
            .records
            .list_for_user(&user_id)
            .await
            .map_err(map_repository_error)?;
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(records)
    }

    async fn get_record(
        &self,
        request: GetIsolationRecordRequest,
    ) -> Result<IsolationRecord, Error> {
        self.load_owned(&request.user_id, request.record_id).await
    }

    async fn record_duration(
        &self,
        request: GetIsolationRecordRequest,
    ) -> Result<IsolationDuration, Error> {
        let record = self.load_owned(&request.user_id, request.record_id).await?;
        Ok(isolation_duration(&record, self.clock.utc()))
    }
}

#[cfg(test)]
#[path = "isolation_record_service_tests.rs"]
mod tests;
