//! Listener and session-cookie settings for the HTTP server.

use std::net::SocketAddr;

use actix_web::cookie::{Key, SameSite};

use isolation_backend::settings::{AppSettings, SettingsError};

/// Everything [`super::create_server`] needs beyond application state.
pub struct ServerConfig {
    pub(crate) session: SessionCookie,
    pub(crate) bind_addr: SocketAddr,
}

/// Session cookie parameters shared by every worker.
#[derive(Clone)]
pub(crate) struct SessionCookie {
    pub(crate) key: Key,
    pub(crate) secure: bool,
    pub(crate) same_site: SameSite,
}

impl ServerConfig {
    /// Derive the server configuration from loaded settings.
    ///
    /// The cookie is `SameSite=Lax` so links into the API from the identity
    /// service keep the session.
    ///
    /// # Errors
    ///
    /// [`SettingsError::BindAddr`] when the listen address does not parse.
    pub fn from_settings(settings: &AppSettings, key: Key) -> Result<Self, SettingsError> {
        Ok(Self {
            session: SessionCookie {
                key,
                secure: settings.session_cookie_secure(),
                same_site: SameSite::Lax,
            },
            bind_addr: settings.bind_addr()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(bind_addr: Option<&str>, secure: bool) -> AppSettings {
        AppSettings {
            bind_addr: bind_addr.map(str::to_owned),
            database_url: None,
            monitor_interval_secs: None,
            warning_dedup: None,
            monitor_owner: None,
            session_key_file: None,
            session_cookie_secure: Some(secure),
            session_allow_ephemeral: None,
        }
    }

    #[test]
    fn takes_listener_and_cookie_flags_from_settings() {
        let config =
            ServerConfig::from_settings(&settings(Some("127.0.0.1:9000"), false), Key::generate())
                .expect("valid settings");

        let expected: SocketAddr = "127.0.0.1:9000".parse().expect("socket addr");
        assert_eq!(config.bind_addr, expected);
        assert!(!config.session.secure);
        assert_eq!(config.session.same_site, SameSite::Lax);
    }

    #[test]
    fn rejects_unparseable_bind_address() {
        let result =
            ServerConfig::from_settings(&settings(Some("mill-lane"), true), Key::generate());

        assert!(matches!(result, Err(SettingsError::BindAddr(raw)) if raw == "mill-lane"));
    }
}
