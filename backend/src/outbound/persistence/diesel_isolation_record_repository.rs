//! PostgreSQL-backed `IsolationRecordRepository` implementation using Diesel.
//!
//! Steps, photos and the approval block are stored as JSONB. Rows are turned
//! back into records through [`IsolationRecord::restore`], so a corrupt row
//! surfaces as an error instead of a half-valid record. The status scan used
//! by the expiry monitor skips such rows instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::isolation::{
    AlertMarkers, ApprovalWorkflow, ExpiryThreshold, IsolationRecord, IsolationSite,
    IsolationStatus, IsolationStep, SignOff, Signatory, StoredIsolationRecord,
    SupportingDocuments, TestEquipment,
};
use crate::domain::ports::{IsolationRecordRepository, IsolationRecordRepositoryError};

use super::diesel_basic_error_mapping::{
    is_unique_violation, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::{IsolationRecordRow, IsolationRecordUpdate, NewIsolationRecordRow};
use super::pool::{DbPool, PoolError};
use super::schema::isolation_records;

/// Diesel-backed implementation of the isolation record repository port.
#[derive(Clone)]
pub struct DieselIsolationRecordRepository {
    pool: DbPool,
}

impl DieselIsolationRecordRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> IsolationRecordRepositoryError {
    map_basic_pool_error(error, IsolationRecordRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> IsolationRecordRepositoryError {
    map_basic_diesel_error(
        error,
        IsolationRecordRepositoryError::query,
        IsolationRecordRepositoryError::connection,
    )
}

/// JSONB columns of a record, serialised once per write.
struct JsonColumns {
    photos: serde_json::Value,
    steps: serde_json::Value,
    approval: serde_json::Value,
}

impl JsonColumns {
    fn encode(record: &IsolationRecord) -> Result<Self, IsolationRecordRepositoryError> {
        let encode = |field: &str, value: Result<serde_json::Value, serde_json::Error>| {
            value.map_err(|err| {
                IsolationRecordRepositoryError::query(format!("serialise {field}: {err}"))
            })
        };
        Ok(Self {
            photos: encode("photos", serde_json::to_value(&record.documents().photos))?,
            steps: encode("steps", serde_json::to_value(record.steps()))?,
            approval: encode("approval", serde_json::to_value(record.approval()))?,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    field: &str,
) -> Result<T, IsolationRecordRepositoryError> {
    serde_json::from_value(value)
        .map_err(|err| IsolationRecordRepositoryError::corrupt(format!("decode {field}: {err}")))
}

/// Convert a database row into a validated domain record.
fn row_to_record(row: IsolationRecordRow) -> Result<IsolationRecord, IsolationRecordRepositoryError> {
    let IsolationRecordRow {
        id,
        user_id,
        site_address,
        circuit_description,
        distribution_board,
        isolation_device,
        lock_off_number,
        voltage_detector_serial,
        voltage_detector_calibration_date,
        proving_unit_used,
        rams_id,
        permit_id,
        photos,
        steps,
        status,
        isolator_name,
        isolator_signature,
        verifier_name,
        verifier_signature,
        re_energised_by,
        approval,
        expiring_alerted_at,
        expired_alerted_at,
        isolation_completed_at,
        re_energisation_at,
        created_at,
        updated_at,
    } = row;

    let status = status
        .parse::<IsolationStatus>()
        .map_err(|err| IsolationRecordRepositoryError::corrupt(err.to_string()))?;
    let steps: Vec<IsolationStep> = decode(steps, "steps")?;
    let photos: Vec<String> = decode(photos, "photos")?;
    let approval: ApprovalWorkflow = decode(approval, "approval")?;

    IsolationRecord::restore(StoredIsolationRecord {
        id,
        user_id: UserId::from_uuid(user_id),
        site: IsolationSite {
            site_address,
            circuit_description,
            distribution_board,
            isolation_device,
            lock_off_number,
        },
        equipment: TestEquipment {
            voltage_detector_serial,
            voltage_detector_calibration_date,
            proving_unit_used,
        },
        documents: SupportingDocuments {
            rams_id,
            permit_id,
            photos,
        },
        steps,
        status,
        sign_off: SignOff {
            isolator: Signatory {
                name: isolator_name,
                signature: isolator_signature,
            },
            verifier: Signatory {
                name: verifier_name,
                signature: verifier_signature,
            },
            re_energised_by,
        },
        approval,
        alerts: AlertMarkers {
            expiring_alerted_at,
            expired_alerted_at,
        },
        created_at,
        updated_at,
        isolation_completed_at,
        re_energisation_at,
    })
    .map_err(|err| IsolationRecordRepositoryError::corrupt(format!("record {id}: {err}")))
}

fn new_row<'a>(record: &'a IsolationRecord, json: &'a JsonColumns) -> NewIsolationRecordRow<'a> {
    let site = record.site();
    let equipment = record.equipment();
    let documents = record.documents();
    let sign_off = record.sign_off();
    let alerts = record.alerts();
    NewIsolationRecordRow {
        id: record.id(),
        user_id: *record.user_id().as_uuid(),
        site_address: &site.site_address,
        circuit_description: &site.circuit_description,
        distribution_board: site.distribution_board.as_deref(),
        isolation_device: site.isolation_device.as_deref(),
        lock_off_number: site.lock_off_number.as_deref(),
        voltage_detector_serial: equipment.voltage_detector_serial.as_deref(),
        voltage_detector_calibration_date: equipment.voltage_detector_calibration_date,
        proving_unit_used: equipment.proving_unit_used,
        rams_id: documents.rams_id.as_deref(),
        permit_id: documents.permit_id.as_deref(),
        photos: &json.photos,
        steps: &json.steps,
        status: record.status().as_str(),
        isolator_name: sign_off.isolator.name.as_deref(),
        isolator_signature: sign_off.isolator.signature.as_deref(),
        verifier_name: sign_off.verifier.name.as_deref(),
        verifier_signature: sign_off.verifier.signature.as_deref(),
        re_energised_by: sign_off.re_energised_by.as_deref(),
        approval: &json.approval,
        expiring_alerted_at: alerts.expiring_alerted_at,
        expired_alerted_at: alerts.expired_alerted_at,
        isolation_completed_at: record.isolation_completed_at(),
        re_energisation_at: record.re_energisation_at(),
        created_at: record.created_at(),
        updated_at: record.updated_at(),
    }
}

fn update_row<'a>(record: &'a IsolationRecord, json: &'a JsonColumns) -> IsolationRecordUpdate<'a> {
    let site = record.site();
    let equipment = record.equipment();
    let documents = record.documents();
    let sign_off = record.sign_off();
    IsolationRecordUpdate {
        site_address: &site.site_address,
        circuit_description: &site.circuit_description,
        distribution_board: site.distribution_board.as_deref(),
        isolation_device: site.isolation_device.as_deref(),
        lock_off_number: site.lock_off_number.as_deref(),
        voltage_detector_serial: equipment.voltage_detector_serial.as_deref(),
        voltage_detector_calibration_date: equipment.voltage_detector_calibration_date,
        proving_unit_used: equipment.proving_unit_used,
        rams_id: documents.rams_id.as_deref(),
        permit_id: documents.permit_id.as_deref(),
        photos: &json.photos,
        steps: &json.steps,
        status: record.status().as_str(),
        isolator_name: sign_off.isolator.name.as_deref(),
        isolator_signature: sign_off.isolator.signature.as_deref(),
        verifier_name: sign_off.verifier.name.as_deref(),
        verifier_signature: sign_off.verifier.signature.as_deref(),
        re_energised_by: sign_off.re_energised_by.as_deref(),
        approval: &json.approval,
        isolation_completed_at: record.isolation_completed_at(),
        re_energisation_at: record.re_energisation_at(),
        updated_at: record.updated_at(),
    }
}

fn rows_to_records(
    rows: Vec<IsolationRecordRow>,
) -> Result<Vec<IsolationRecord>, IsolationRecordRepositoryError> {
    rows.into_iter().map(row_to_record).collect()
}

/// Restore the rows that decode, logging and skipping corrupt ones.
///
/// Used for the monitor's working set, where one bad row must not hide
/// every other isolated circuit.
fn usable_records(rows: Vec<IsolationRecordRow>) -> Vec<IsolationRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let record_id = row.id;
            row_to_record(row)
                .inspect_err(|error| {
                    warn!(%record_id, %error, "skipping corrupt isolation record");
                })
                .ok()
        })
        .collect()
}

#[async_trait]
impl IsolationRecordRepository for DieselIsolationRecordRepository {
    async fn insert(&self, record: &IsolationRecord) -> Result<(), IsolationRecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let json = JsonColumns::encode(record)?;

        diesel::insert_into(isolation_records::table)
            .values(&new_row(record, &json))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                if is_unique_violation(&err) {
                    IsolationRecordRepositoryError::duplicate(record.id())
                } else {
                    map_diesel_error(err)
                }
            })
    }

    async fn save(&self, record: &IsolationRecord) -> Result<(), IsolationRecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let json = JsonColumns::encode(record)?;

        let affected = diesel::update(isolation_records::table.find(record.id()))
            .set(&update_row(record, &json))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if affected == 0 {
            return Err(IsolationRecordRepositoryError::missing(record.id()));
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<IsolationRecord>, IsolationRecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = isolation_records::table
            .filter(isolation_records::id.eq(id))
            .select(IsolationRecordRow::as_select())
            .first::<IsolationRecordRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_record).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<IsolationRecord>, IsolationRecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<IsolationRecordRow> = isolation_records::table
            .filter(isolation_records::user_id.eq(user_id.as_uuid()))
            .order((
                isolation_records::created_at.desc(),
                isolation_records::id.desc(),
            ))
            .select(IsolationRecordRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows_to_records(rows)
    }

    async fn list_by_status(
        &self,
        status: IsolationStatus,
        owner: Option<UserId>,
    ) -> Result<Vec<IsolationRecord>, IsolationRecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = isolation_records::table
            .filter(isolation_records::status.eq(status.as_str()))
            .into_boxed();
        if let Some(owner) = owner {
            query = query.filter(isolation_records::user_id.eq(*owner.as_uuid()));
        }

        let rows: Vec<IsolationRecordRow> = query
            .order((
                isolation_records::created_at.desc(),
                isolation_records::id.desc(),
            ))
            .select(IsolationRecordRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(usable_records(rows))
    }

    async fn mark_alerted(
        &self,
        id: &Uuid,
        threshold: ExpiryThreshold,
        at: DateTime<Utc>,
    ) -> Result<(), IsolationRecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let target = isolation_records::table.find(*id);

        let affected = match threshold {
            ExpiryThreshold::Expiring => {
                diesel::update(target)
                    .set(isolation_records::expiring_alerted_at.eq(Some(at)))
                    .execute(&mut conn)
                    .await
            }
            ExpiryThreshold::Expired => {
                diesel::update(target)
                    .set(isolation_records::expired_alerted_at.eq(Some(at)))
                    .execute(&mut conn)
                    .await
            }
        }
        .map_err(map_diesel_error)?;

        if affected == 0 {
            return Err(IsolationRecordRepositoryError::missing(*id));
        }
        Ok(())
    }
}
