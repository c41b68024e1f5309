//! Driving port for isolation record reads.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::isolation::{IsolationDuration, IsolationRecord};
use crate::domain::{Error, UserId};

/// Request naming one owned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetIsolationRecordRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Record to read.
    pub record_id: Uuid,
}

/// Driving port for isolation record read operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IsolationRecordQuery: Send + Sync {
    /// All records owned by `user_id`, newest-created first.
    async fn list_records(&self, user_id: UserId) -> Result<Vec<IsolationRecord>, Error>;

    /// One owned record.
    async fn get_record(&self, request: GetIsolationRecordRequest)
    -> Result<IsolationRecord, Error>;

    /// Timeout classification of one owned record at the current instant.
    async fn record_duration(
        &self,
        request: GetIsolationRecordRequest,
    ) -> Result<IsolationDuration, Error>;
}
