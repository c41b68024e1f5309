//! Safe isolation backend library.
//!
//! Tracks GS38 safe-isolation records through their eight-step lifecycle,
//! exposes them over a session-authenticated REST API, and watches isolated
//! circuits for the eight-hour timeout.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
