//! Isolation timeout policy.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{IsolationRecord, IsolationStatus};

/// Maximum time a circuit may stay isolated.
pub const ISOLATION_TIMEOUT_HOURS: i64 = 8;

/// Width of the warning window before the timeout.
pub const EXPIRING_WINDOW_HOURS: i64 = 1;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Alert thresholds announced by the expiry monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryThreshold {
    /// Inside the final hour.
    Expiring,
    /// Past the timeout.
    Expired,
}

impl ExpiryThreshold {
    /// Stable wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expiring => "expiring",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for ExpiryThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elapsed isolation time classified against the timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsolationDuration {
    /// Hours since isolation was confirmed.
    pub hours_elapsed: f64,
    /// Within the final hour.
    pub is_expiring: bool,
    /// Past the timeout.
    pub is_expired: bool,
    /// Human-readable summary.
    #[schema(example = "30 min remaining")]
    pub label: String,
}

impl IsolationDuration {
    /// Result for records the timeout does not apply to.
    #[must_use]
    pub fn not_applicable() -> Self {
        Self {
            hours_elapsed: 0.0,
            is_expiring: false,
            is_expired: false,
            label: String::new(),
        }
    }

    /// Highest threshold reached, if any.
    #[must_use]
    pub fn threshold(&self) -> Option<ExpiryThreshold> {
        if self.is_expired {
            Some(ExpiryThreshold::Expired)
        } else if self.is_expiring {
            Some(ExpiryThreshold::Expiring)
        } else {
            None
        }
    }

    /// Minutes left before the timeout, rounded.
    #[must_use]
    pub fn minutes_remaining(&self) -> f64 {
        ((timeout_hours() - self.hours_elapsed) * 60.0).round()
    }
}

/// Classify how long `record` has been isolated as of `now`.
///
/// Records that are not `isolated`, lack a confirmation time, or whose
/// confirmation time is in the future yield [`IsolationDuration::not_applicable`].
///
/// # Examples
/// ```
/// use chrono::{Duration, Utc};
/// use isolation_backend::domain::isolation::{IsolationDuration, isolation_duration};
/// # use isolation_backend::domain::UserId;
/// # use isolation_backend::domain::isolation::{IsolationRecord, IsolationRecordDraft, IsolationSite};
/// # use uuid::Uuid;
/// # let record = IsolationRecord::start(
/// #     IsolationRecordDraft {
/// #         id: Uuid::new_v4(),
/// #         user_id: UserId::random(),
/// #         site: IsolationSite {
/// #             site_address: "Unit 4".into(),
/// #             circuit_description: "Lighting".into(),
/// #             ..IsolationSite::default()
/// #         },
/// #         equipment: Default::default(),
/// #         documents: Default::default(),
/// #         sign_off: Default::default(),
/// #         requires_approval: false,
/// #     },
/// #     Utc::now(),
/// # )
/// # .expect("valid draft");
///
/// // Still in progress, so the timeout does not apply.
/// let later = Utc::now() + Duration::hours(12);
/// assert_eq!(isolation_duration(&record, later), IsolationDuration::not_applicable());
/// ```
#[must_use]
pub fn isolation_duration(record: &IsolationRecord, now: DateTime<Utc>) -> IsolationDuration {
    if record.status() != IsolationStatus::Isolated {
        return IsolationDuration::not_applicable();
    }
    let Some(started) = record.isolation_completed_at() else {
        return IsolationDuration::not_applicable();
    };
    let elapsed = now.signed_duration_since(started);
    if elapsed < chrono::Duration::zero() {
        return IsolationDuration::not_applicable();
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "isolation spans are hours, far below f64 integer precision"
    )]
    let hours_elapsed = elapsed.num_milliseconds() as f64 / MILLIS_PER_HOUR;
    classify(hours_elapsed)
}

fn classify(hours_elapsed: f64) -> IsolationDuration {
    let limit = timeout_hours();
    #[expect(
        clippy::cast_precision_loss,
        reason = "constant window is a small integer"
    )]
    let window = EXPIRING_WINDOW_HOURS as f64;
    let is_expired = hours_elapsed >= limit;
    let is_expiring = !is_expired && hours_elapsed >= limit - window;
    let remaining = limit - hours_elapsed;

    let label = if is_expired {
        format!(
            "{}h elapsed (limit {ISOLATION_TIMEOUT_HOURS}h)",
            hours_elapsed.round()
        )
    } else if is_expiring {
        format!("{} min remaining", (remaining * 60.0).round())
    } else {
        format!("{remaining:.1}h remaining")
    };

    IsolationDuration {
        hours_elapsed,
        is_expiring,
        is_expired,
        label,
    }
}

fn timeout_hours() -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "constant timeout is a small integer"
    )]
    let hours = ISOLATION_TIMEOUT_HOURS as f64;
    hours
}
