//! Port for delivering isolation timeout alerts.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::isolation::ExpiryThreshold;

use super::define_port_error;

define_port_error! {
    /// Errors raised by alert delivery adapters.
    pub enum IsolationAlertSinkError {
        /// The alert could not be delivered.
        Delivery { message: String } =>
            "isolation alert delivery failed: {message}",
    }
}

/// How urgently an alert needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// The timeout is approaching.
    Warning,
    /// The timeout has passed.
    Critical,
}

impl AlertSeverity {
    /// Severity used for each threshold.
    #[must_use]
    pub const fn for_threshold(threshold: ExpiryThreshold) -> Self {
        match threshold {
            ExpiryThreshold::Expiring => Self::Warning,
            ExpiryThreshold::Expired => Self::Critical,
        }
    }

    /// Stable wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert about one record crossing one threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationAlert {
    /// Record the alert concerns.
    pub record_id: Uuid,
    /// Owner of the record.
    pub user_id: UserId,
    /// Threshold crossed.
    pub threshold: ExpiryThreshold,
    /// Urgency.
    pub severity: AlertSeverity,
    /// Short headline.
    pub title: String,
    /// Detail naming the circuit and the time position.
    pub description: String,
}

/// Fire-and-forget alert delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IsolationAlertSink: Send + Sync {
    /// Deliver `alert`.
    async fn notify(&self, alert: &IsolationAlert) -> Result<(), IsolationAlertSinkError>;
}
