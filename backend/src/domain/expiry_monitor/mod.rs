//! Background monitor for isolations approaching or past the timeout.
//!
//! Each check loads the `isolated` records in scope, classifies them with
//! [`isolation_duration`], and announces each threshold at most once per
//! record. With [`WarningDedup::Durable`] the announcement is also written
//! back through the repository so a restarted monitor stays quiet.
//!
//! Failures never stop a scan: a failed load is logged and retried on the
//! next tick, and marker or alert delivery errors are logged per record.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::isolation::{
    ExpiryThreshold, ISOLATION_TIMEOUT_HOURS, IsolationDuration, IsolationRecord, IsolationStatus,
    isolation_duration,
};
use crate::domain::ports::{
    AlertSeverity, IsolationAlert, IsolationAlertSink, IsolationRecordRepository,
};

mod ledger;
mod runtime;

use ledger::AlertLedger;
pub use runtime::ExpiryMonitorHandle;

/// Default polling interval.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval the loop will tick at.
pub const MIN_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// How announced thresholds are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningDedup {
    /// Remember in memory for the lifetime of this monitor.
    #[default]
    Session,
    /// Also persist markers on the record.
    Durable,
}

impl fmt::Display for WarningDedup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::Durable => "durable",
        })
    }
}

/// Error returned for an unknown dedup policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown warning dedup policy `{0}`; expected `session` or `durable`")]
pub struct UnknownWarningDedup(pub String);

impl FromStr for WarningDedup {
    type Err = UnknownWarningDedup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "durable" => Ok(Self::Durable),
            _ => Err(UnknownWarningDedup(s.to_owned())),
        }
    }
}

/// Which owners' records a monitor watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorScope {
    /// Every owner; used by the service deployment.
    #[default]
    AllOwners,
    /// A single owner.
    Owner(UserId),
}

impl MonitorScope {
    fn owner(self) -> Option<UserId> {
        match self {
            Self::AllOwners => None,
            Self::Owner(user_id) => Some(user_id),
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryMonitorConfig {
    /// Time between checks.
    pub interval: Duration,
    /// Dedup policy.
    pub dedup: WarningDedup,
    /// Working set.
    pub scope: MonitorScope,
}

impl Default for ExpiryMonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_MONITOR_INTERVAL,
            dedup: WarningDedup::default(),
            scope: MonitorScope::default(),
        }
    }
}

/// Port bundle required by the monitor.
pub struct ExpiryMonitorPorts {
    /// Record persistence.
    pub records: Arc<dyn IsolationRecordRepository>,
    /// Alert delivery.
    pub alerts: Arc<dyn IsolationAlertSink>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    /// Records examined.
    pub scanned: usize,
    /// Alerts announced.
    pub alerts_sent: usize,
    /// The working set could not be loaded.
    pub load_failed: bool,
}

/// Polls isolated records and announces timeout thresholds.
pub struct ExpiryMonitor {
    ports: ExpiryMonitorPorts,
    config: ExpiryMonitorConfig,
    ledger: AlertLedger,
}

impl ExpiryMonitor {
    /// Build a monitor; nothing runs until [`ExpiryMonitor::spawn`] or
    /// [`ExpiryMonitor::run_check`].
    pub fn new(ports: ExpiryMonitorPorts, config: ExpiryMonitorConfig) -> Self {
        let ledger = AlertLedger::new(config.dedup);
        Self {
            ports,
            config,
            ledger,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ExpiryMonitorConfig {
        &self.config
    }

    /// Load the working set and check it against the current instant.
    pub async fn run_check(&self) -> CheckSummary {
        let records = match self
            .ports
            .records
            .list_by_status(IsolationStatus::Isolated, self.config.scope.owner())
            .await
        {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "expiry check could not load isolated records");
                return CheckSummary {
                    load_failed: true,
                    ..CheckSummary::default()
                };
            }
        };
        let isolated: HashSet<Uuid> = records.iter().map(IsolationRecord::id).collect();
        let forgotten = self.ledger.retain_isolated(&isolated);
        if forgotten > 0 {
            debug!(forgotten, "pruned alert ledger");
        }
        let now = self.ports.clock.utc();
        self.check_records(&records, now).await
    }

    /// Check `records` as of `now`, announcing newly crossed thresholds.
    pub async fn check_records(
        &self,
        records: &[IsolationRecord],
        now: DateTime<Utc>,
    ) -> CheckSummary {
        let mut summary = CheckSummary {
            scanned: records.len(),
            ..CheckSummary::default()
        };
        for record in records {
            let duration = isolation_duration(record, now);
            let Some(threshold) = duration.threshold() else {
                continue;
            };
            if !self.ledger.claim(record, threshold) {
                continue;
            }
            self.persist_marker(record, threshold, now).await;
            self.announce(record, threshold, &duration).await;
            summary.alerts_sent += 1;
        }
        debug!(
            scanned = summary.scanned,
            alerts = summary.alerts_sent,
            "expiry check complete"
        );
        summary
    }

    async fn persist_marker(
        &self,
        record: &IsolationRecord,
        threshold: ExpiryThreshold,
        now: DateTime<Utc>,
    ) {
        if self.config.dedup != WarningDedup::Durable {
            return;
        }
        if let Err(err) = self
            .ports
            .records
            .mark_alerted(&record.id(), threshold, now)
            .await
        {
            warn!(
                record_id = %record.id(),
                %threshold,
                error = %err,
                "failed to persist isolation alert marker"
            );
        }
    }

    async fn announce(
        &self,
        record: &IsolationRecord,
        threshold: ExpiryThreshold,
        duration: &IsolationDuration,
    ) {
        let alert = build_alert(record, threshold, duration);
        info!(
            record_id = %alert.record_id,
            user_id = %alert.user_id,
            %threshold,
            severity = %alert.severity,
            "isolation timeout threshold crossed"
        );
        if let Err(err) = self.ports.alerts.notify(&alert).await {
            warn!(
                record_id = %alert.record_id,
                %threshold,
                error = %err,
                "failed to deliver isolation alert"
            );
        }
    }
}

fn build_alert(
    record: &IsolationRecord,
    threshold: ExpiryThreshold,
    duration: &IsolationDuration,
) -> IsolationAlert {
    let circuit = record.site().circuit_description.as_str();
    let (title, description) = match threshold {
        ExpiryThreshold::Expired => (
            "Isolation time limit exceeded".to_owned(),
            format!(
                "{circuit} has been isolated for {}h (limit {ISOLATION_TIMEOUT_HOURS}h). \
                 Re-energise or re-verify the isolation.",
                duration.hours_elapsed.round()
            ),
        ),
        ExpiryThreshold::Expiring => (
            "Isolation approaching time limit".to_owned(),
            format!(
                "{circuit}: {} min remaining before the {ISOLATION_TIMEOUT_HOURS}h limit.",
                duration.minutes_remaining()
            ),
        ),
    };
    IsolationAlert {
        record_id: record.id(),
        user_id: *record.user_id(),
        threshold,
        severity: AlertSeverity::for_threshold(threshold),
        title,
        description,
    }
}

#[cfg(test)]
mod tests;
