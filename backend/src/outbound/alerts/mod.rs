//! Alert delivery through the tracing pipeline.
//!
//! Warnings are emitted at `warn` and critical alerts at `error`, so the log
//! shipper's level routing decides who gets paged.

use async_trait::async_trait;
use tracing::{error, warn};

use crate::domain::ports::{
    AlertSeverity, IsolationAlert, IsolationAlertSink, IsolationAlertSinkError,
};

/// Alert sink that writes structured tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl IsolationAlertSink for TracingAlertSink {
    async fn notify(&self, alert: &IsolationAlert) -> Result<(), IsolationAlertSinkError> {
        match alert.severity {
            AlertSeverity::Warning => warn!(
                target: "isolation_alerts",
                record_id = %alert.record_id,
                user_id = %alert.user_id,
                threshold = %alert.threshold,
                title = %alert.title,
                "{}",
                alert.description
            ),
            AlertSeverity::Critical => error!(
                target: "isolation_alerts",
                record_id = %alert.record_id,
                user_id = %alert.user_id,
                threshold = %alert.threshold,
                title = %alert.title,
                "{}",
                alert.description
            ),
        }
        Ok(())
    }
}
