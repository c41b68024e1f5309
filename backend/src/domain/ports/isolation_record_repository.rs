//! Port for isolation record persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::isolation::{ExpiryThreshold, IsolationRecord, IsolationStatus};

use super::define_port_error;

define_port_error! {
    /// Errors raised by isolation record repository adapters.
    pub enum IsolationRecordRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "isolation record repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "isolation record repository query failed: {message}",
        /// A record with this id already exists.
        Duplicate { id: Uuid } =>
            "isolation record {id} already exists",
        /// No record with this id exists.
        Missing { id: Uuid } =>
            "isolation record {id} does not exist",
        /// A stored row could not be turned back into a record.
        Corrupt { message: String } =>
            "isolation record is corrupt: {message}",
    }
}

/// Port for reading and writing isolation records.
///
/// Records are never deleted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IsolationRecordRepository: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, record: &IsolationRecord) -> Result<(), IsolationRecordRepositoryError>;

    /// Overwrite an existing record.
    async fn save(&self, record: &IsolationRecord) -> Result<(), IsolationRecordRepositoryError>;

    /// Find a record by id, regardless of owner.
    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<IsolationRecord>, IsolationRecordRepositoryError>;

    /// All records owned by `user_id`, newest-created first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<IsolationRecord>, IsolationRecordRepositoryError>;

    /// Records in `status`, optionally restricted to one owner.
    async fn list_by_status(
        &self,
        status: IsolationStatus,
        owner: Option<UserId>,
    ) -> Result<Vec<IsolationRecord>, IsolationRecordRepositoryError>;

    /// Persist that `threshold` was announced for record `id` at `at`.
    async fn mark_alerted(
        &self,
        id: &Uuid,
        threshold: ExpiryThreshold,
        at: DateTime<Utc>,
    ) -> Result<(), IsolationRecordRepositoryError>;
}
