//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Async access goes through `diesel-async` with `bb8` pooling. Row structs
//! (`models.rs`) and table definitions (`schema.rs`) stay private to this
//! module; adapters translate them into domain records and map every
//! database failure onto the port's error type.
//!
//! # Example
//!
//! ```ignore
//! use isolation_backend::outbound::persistence::{
//!     DbPool, DieselIsolationRecordRepository, PoolConfig, run_pending_migrations,
//! };
//!
//! run_pending_migrations("postgres://localhost/isolations").await?;
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/isolations")).await?;
//! let repo = DieselIsolationRecordRepository::new(pool);
//! ```

mod diesel_basic_error_mapping;
mod diesel_isolation_record_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_isolation_record_repository::DieselIsolationRecordRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
