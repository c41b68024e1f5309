//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// GS38 safe isolation records. Rows are never deleted.
    isolation_records (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Owning user.
        user_id -> Uuid,
        site_address -> Text,
        circuit_description -> Text,
        distribution_board -> Nullable<Text>,
        isolation_device -> Nullable<Text>,
        lock_off_number -> Nullable<Text>,
        voltage_detector_serial -> Nullable<Text>,
        voltage_detector_calibration_date -> Nullable<Date>,
        proving_unit_used -> Bool,
        rams_id -> Nullable<Text>,
        permit_id -> Nullable<Text>,
        /// JSON array of photo references.
        photos -> Jsonb,
        /// JSON array of exactly eight GS38 steps.
        steps -> Jsonb,
        /// Lifecycle status in snake_case.
        status -> Text,
        isolator_name -> Nullable<Text>,
        isolator_signature -> Nullable<Text>,
        verifier_name -> Nullable<Text>,
        verifier_signature -> Nullable<Text>,
        re_energised_by -> Nullable<Text>,
        /// Approval workflow document.
        approval -> Jsonb,
        expiring_alerted_at -> Nullable<Timestamptz>,
        expired_alerted_at -> Nullable<Timestamptz>,
        isolation_completed_at -> Nullable<Timestamptz>,
        re_energisation_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
