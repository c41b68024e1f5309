//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod isolation_alert_sink;
mod isolation_record_command;
mod isolation_record_query;
mod isolation_record_repository;

#[cfg(test)]
pub use isolation_alert_sink::MockIsolationAlertSink;
pub use isolation_alert_sink::{
    AlertSeverity, IsolationAlert, IsolationAlertSink, IsolationAlertSinkError,
};
#[cfg(test)]
pub use isolation_record_command::MockIsolationRecordCommand;
pub use isolation_record_command::{
    CreateIsolationRecordRequest, IsolationRecordCommand, UpdateIsolationRecordRequest,
};
#[cfg(test)]
pub use isolation_record_query::MockIsolationRecordQuery;
pub use isolation_record_query::{GetIsolationRecordRequest, IsolationRecordQuery};
#[cfg(test)]
pub use isolation_record_repository::MockIsolationRecordRepository;
pub use isolation_record_repository::{IsolationRecordRepository, IsolationRecordRepositoryError};
