//! HTTP server assembly: routes, session cookie and request tracing.

mod config;

pub use config::ServerConfig;
use config::SessionCookie;

use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession},
    storage::CookieSessionStore,
};
use actix_web::cookie::time::Duration;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tracing::info;

use isolation_backend::Trace;
#[cfg(debug_assertions)]
use isolation_backend::doc::ApiDoc;
use isolation_backend::inbound::http::health::{HealthState, live, ready};
use isolation_backend::inbound::http::isolation_records;
use isolation_backend::inbound::http::state::HttpState;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

const SESSION_COOKIE_NAME: &str = "session";
const SESSION_TTL: Duration = Duration::hours(2);
const API_PREFIX: &str = "/api/v1";

/// Private (encrypted) cookie session; only the isolation API reads it.
fn session_middleware(cookie: SessionCookie) -> SessionMiddleware<CookieSessionStore> {
    let SessionCookie {
        key,
        secure,
        same_site,
    } = cookie;
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name(SESSION_COOKIE_NAME.to_owned())
        .cookie_path("/".to_owned())
        .cookie_secure(secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(same_site)
        .session_lifecycle(PersistentSession::default().session_ttl(SESSION_TTL))
        .build()
}

/// Assemble one worker's application.
///
/// Health probes sit outside the session scope so orchestrators can call
/// them without a cookie.
fn isolation_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    cookie: SessionCookie,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let isolations = web::scope(API_PREFIX)
        .wrap(session_middleware(cookie))
        .configure(isolation_records::configure);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(isolations)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Bind the listener and return the unstarted server.
///
/// Signal handling is disabled; the caller owns shutdown so the expiry
/// monitor can be stopped alongside the listener. Readiness is likewise
/// left to the caller.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let ServerConfig { session, bind_addr } = config;

    let server = HttpServer::new(move || {
        isolation_app(health_state.clone(), http_state.clone(), session.clone())
    })
    .bind(bind_addr)?
    .disable_signals()
    .run();

    info!(%bind_addr, "http server listening");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::cookie::{Key, SameSite};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use rstest::rstest;

    use isolation_backend::domain::{IsolationRecordService, TRACE_ID_HEADER};
    use isolation_backend::outbound::memory::InMemoryIsolationRecordRepository;

    use super::*;

    fn http_state() -> web::Data<HttpState> {
        let service = Arc::new(IsolationRecordService::new(
            Arc::new(InMemoryIsolationRecordRepository::new()),
            Arc::new(mockable::DefaultClock),
        ));
        web::Data::new(HttpState::new(service.clone(), service))
    }

    fn cookie() -> SessionCookie {
        SessionCookie {
            key: Key::generate(),
            secure: false,
            same_site: SameSite::Lax,
        }
    }

    #[rstest]
    #[case("/health/live", false, StatusCode::OK)]
    #[case("/health/ready", false, StatusCode::SERVICE_UNAVAILABLE)]
    #[case("/health/ready", true, StatusCode::OK)]
    #[case("/api/v1/isolations", true, StatusCode::UNAUTHORIZED)]
    #[actix_web::test]
    async fn routes_are_mounted(
        #[case] uri: &str,
        #[case] mark_ready: bool,
        #[case] expected: StatusCode,
    ) {
        let health_state = web::Data::new(HealthState::new());
        if mark_ready {
            health_state.mark_ready();
        }
        let app = test::init_service(isolation_app(health_state, http_state(), cookie())).await;

        let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;

        assert_eq!(res.status(), expected);
        assert!(res.headers().contains_key(TRACE_ID_HEADER));
    }
}
