//! Domain primitives, aggregates and services.
//!
//! Purpose: model GS38 safe-isolation records and their lifecycle
//! independently of HTTP and storage. Adapters reach the domain through the
//! ports in [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: API error payload and stable error identifier.
//! - TraceId: request correlation identifier.
//! - UserId: owner identity.
//! - IsolationRecordService: driving port implementation.
//! - isolation: the record aggregate, step template and duration rules.
//! - expiry_monitor: background timeout alerting.

pub mod error;
pub mod expiry_monitor;
pub mod isolation;
pub mod isolation_record_service;
pub mod ports;
pub mod trace_id;
pub mod user;

pub use self::error::{Error, ErrorCode};
pub use self::isolation_record_service::IsolationRecordService;
pub use self::trace_id::TraceId;
pub use self::user::{UserId, UserIdValidationError};

/// HTTP header name used to propagate trace identifiers.
pub const TRACE_ID_HEADER: &str = "trace-id";
