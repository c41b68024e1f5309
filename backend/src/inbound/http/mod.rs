//! HTTP inbound adapter exposing REST endpoints.

pub mod error;
pub mod health;
pub mod isolation_records;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub(crate) mod validation;

pub use error::ApiResult;
