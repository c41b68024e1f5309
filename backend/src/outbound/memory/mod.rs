//! In-process isolation record store.
//!
//! Used when no database URL is configured and by the end-to-end tests.
//! Contents are lost on restart.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::isolation::{ExpiryThreshold, IsolationRecord, IsolationStatus};
use crate::domain::ports::{IsolationRecordRepository, IsolationRecordRepositoryError};

/// `RwLock<HashMap>` implementation of the repository port.
#[derive(Debug, Default)]
pub struct InMemoryIsolationRecordRepository {
    records: RwLock<HashMap<Uuid, IsolationRecord>>,
}

impl InMemoryIsolationRecordRepository {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> IsolationRecordRepositoryError {
    IsolationRecordRepositoryError::query("in-memory store lock poisoned")
}

fn newest_first(mut records: Vec<IsolationRecord>) -> Vec<IsolationRecord> {
    records.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
    records
}

#[async_trait]
impl IsolationRecordRepository for InMemoryIsolationRecordRepository {
    async fn insert(&self, record: &IsolationRecord) -> Result<(), IsolationRecordRepositoryError> {
        let mut records = self.records.write().map_err(poisoned)?;
        match records.entry(record.id()) {
            Entry::Occupied(_) => Err(IsolationRecordRepositoryError::duplicate(record.id())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn save(&self, record: &IsolationRecord) -> Result<(), IsolationRecordRepositoryError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let slot = records
            .get_mut(&record.id())
            .ok_or_else(|| IsolationRecordRepositoryError::missing(record.id()))?;
        // Alert markers are owned by `mark_alerted`; keep the stored ones.
        let alerts = slot.alerts();
        let mut next = record.clone();
        if let Some(at) = alerts.expiring_alerted_at {
            next.mark_alerted(ExpiryThreshold::Expiring, at);
        }
        if let Some(at) = alerts.expired_alerted_at {
            next.mark_alerted(ExpiryThreshold::Expired, at);
        }
        *slot = next;
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<IsolationRecord>, IsolationRecordRepositoryError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<IsolationRecord>, IsolationRecordRepositoryError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(newest_first(
            records
                .values()
                .filter(|record| record.user_id() == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_status(
        &self,
        status: IsolationStatus,
        owner: Option<UserId>,
    ) -> Result<Vec<IsolationRecord>, IsolationRecordRepositoryError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(newest_first(
            records
                .values()
                .filter(|record| record.status() == status)
                .filter(|record| owner.is_none_or(|owner| record.user_id() == &owner))
                .cloned()
                .collect(),
        ))
    }

    async fn mark_alerted(
        &self,
        id: &Uuid,
        threshold: ExpiryThreshold,
        at: DateTime<Utc>,
    ) -> Result<(), IsolationRecordRepositoryError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| IsolationRecordRepositoryError::missing(*id))?;
        record.mark_alerted(threshold, at);
        Ok(())
    }
}
