//! Test helpers for inbound HTTP components.

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{HttpResponse, Resource, test, web};

use crate::domain::{Error, UserId};
use crate::inbound::http::session::SessionContext;

const TEST_LOGIN_PATH: &str = "/test-login/{user_id}";

/// Build a session middleware configured for tests.
///
/// Uses a fresh key per invocation, names the cookie `session` and disables
/// the `Secure` flag for plain HTTP.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Route that stores the path's user id in the session, standing in for
/// the external identity service.
pub fn test_login_resource() -> Resource {
    web::resource(TEST_LOGIN_PATH).route(web::post().to(
        |session: SessionContext, path: web::Path<String>| async move {
            let user_id = UserId::new(path.into_inner())
                .map_err(|err| Error::invalid_request(err.to_string()))?;
            session.persist_user(&user_id)?;
            Ok::<_, Error>(HttpResponse::NoContent().finish())
        },
    ))
}

/// Log `user_id` in through [`test_login_resource`] and return the cookie.
pub async fn login_cookie<S>(app: &S, user_id: UserId) -> Cookie<'static>
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let request = test::TestRequest::post()
        .uri(&format!("/test-login/{user_id}"))
        .to_request();
    let response = test::call_service(app, request).await;
    assert!(response.status().is_success(), "test login failed");
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie")
        .into_owned()
}
