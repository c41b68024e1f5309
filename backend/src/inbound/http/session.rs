//! Authenticated-user extraction from the session cookie.
//!
//! The identity service that shares the signing key issues the cookie. The
//! isolation API only reads the user id back out of it; records are scoped
//! to that id.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::domain::{Error, UserId};

/// Session entry holding the authenticated user's id.
pub(crate) const USER_ID_KEY: &str = "user_id";

/// Handler-facing view of the session.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Wrap an Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Record `user_id` as the signed-in user.
    pub fn persist_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.0
            .insert(USER_ID_KEY, user_id.to_string())
            .map_err(|err| Error::internal(format!("session write failed: {err}")))
    }

    /// The signed-in user, or `None` for anonymous or unusable sessions.
    ///
    /// A cookie that decrypts but carries a malformed id is treated as
    /// anonymous rather than as a server fault.
    pub fn user_id(&self) -> Result<Option<UserId>, Error> {
        let raw = self
            .0
            .get::<String>(USER_ID_KEY)
            .map_err(|err| Error::internal(format!("session read failed: {err}")))?;
        let Some(raw) = raw else {
            debug!("request carries no signed-in user");
            return Ok(None);
        };
        Ok(UserId::try_from(raw)
            .inspect_err(|err| warn!(error = %err, "discarding malformed session user id"))
            .ok())
    }

    /// The signed-in user, or `401 Unauthorized`.
    pub fn require_user_id(&self) -> Result<UserId, Error> {
        self.user_id()?
            .ok_or_else(|| Error::unauthorized("sign in to manage isolation records"))
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let session = Session::from_request(req, payload);
        Box::pin(async move { Ok(Self::new(session.await?)) })
    }
}
