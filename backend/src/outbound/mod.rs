//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repository using Diesel ORM
//! - **memory**: in-process repository for database-less runs and tests
//! - **alerts**: alert sink that writes structured tracing events
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod alerts;
pub mod memory;
pub mod persistence;
