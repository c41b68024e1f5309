//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the isolation record endpoints, the health probes,
//! and the session cookie security scheme. The document is served by Swagger
//! UI in debug builds and exported via `cargo run --bin openapi-dump`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::isolation::{
    ApprovalStatus, ApprovalWorkflow, ExpiryThreshold, IsolationDuration, IsolationStatus,
    IsolationStep, VoltageReadings,
};
use crate::domain::{Error, ErrorCode};
use crate::inbound::http::isolation_records::{
    ApprovalActionBody, CreateIsolationRecordBody, IsolationRecordBody, StepPatchBody,
    UpdateIsolationRecordBody,
};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by the identity service.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Safe isolation backend API",
        description = "GS38 safe-isolation records, lifecycle tracking and health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::isolation_records::create_isolation_record,
        crate::inbound::http::isolation_records::list_isolation_records,
        crate::inbound::http::isolation_records::get_isolation_record,
        crate::inbound::http::isolation_records::update_isolation_record,
        crate::inbound::http::isolation_records::get_isolation_duration,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        IsolationRecordBody,
        CreateIsolationRecordBody,
        UpdateIsolationRecordBody,
        StepPatchBody,
        ApprovalActionBody,
        IsolationStep,
        VoltageReadings,
        ApprovalWorkflow,
        ApprovalStatus,
        IsolationStatus,
        IsolationDuration,
        ExpiryThreshold,
        Error,
        ErrorCode
    )),
    tags(
        (name = "isolations", description = "Safe-isolation records and their lifecycle"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
