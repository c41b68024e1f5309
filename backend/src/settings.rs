//! Process configuration loaded via OrthoConfig.
//!
//! Values come from CLI flags, `ISOLATION_*` environment variables and
//! configuration files, in OrthoConfig's usual precedence.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::UserId;
use crate::domain::expiry_monitor::{
    DEFAULT_MONITOR_INTERVAL, MonitorScope, UnknownWarningDedup, WarningDedup,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SESSION_KEY_FILE: &str = "/var/run/secrets/session_key";

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// `bind_addr` is not a socket address.
    #[error("invalid bind address `{0}`")]
    BindAddr(String),
    /// `warning_dedup` is not a known policy.
    #[error(transparent)]
    WarningDedup(#[from] UnknownWarningDedup),
    /// `monitor_owner` is not a user id.
    #[error("invalid monitor owner `{0}`")]
    MonitorOwner(String),
}

/// Server, persistence and expiry monitor settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "ISOLATION")]
pub struct AppSettings {
    /// Listen address; defaults to `0.0.0.0:8080`.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL. Without it records are kept in memory.
    pub database_url: Option<String>,
    /// Seconds between expiry checks; defaults to 60.
    pub monitor_interval_secs: Option<u64>,
    /// `session` or `durable`; defaults to `session`.
    pub warning_dedup: Option<String>,
    /// Restrict the monitor to one owner's records.
    pub monitor_owner: Option<String>,
    /// Session signing key file.
    pub session_key_file: Option<PathBuf>,
    /// Mark the session cookie `Secure`; defaults to `true`.
    pub session_cookie_secure: Option<bool>,
    /// Fall back to a throwaway session key when the key file is missing;
    /// defaults to `false`.
    pub session_allow_ephemeral: Option<bool>,
}

impl AppSettings {
    /// Parsed listen address.
    ///
    /// # Errors
    ///
    /// [`SettingsError::BindAddr`] when the value is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse()
            .map_err(|_| SettingsError::BindAddr(raw.to_owned()))
    }

    /// Expiry check interval.
    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        self.monitor_interval_secs
            .map_or(DEFAULT_MONITOR_INTERVAL, Duration::from_secs)
    }

    /// Warning deduplication policy.
    ///
    /// # Errors
    ///
    /// [`SettingsError::WarningDedup`] for unknown policy names.
    pub fn warning_dedup(&self) -> Result<WarningDedup, SettingsError> {
        self.warning_dedup
            .as_deref()
            .map_or_else(|| Ok(WarningDedup::default()), str::parse)
            .map_err(SettingsError::from)
    }

    /// Which owners the monitor scans.
    ///
    /// # Errors
    ///
    /// [`SettingsError::MonitorOwner`] when the owner is not a UUID.
    pub fn monitor_scope(&self) -> Result<MonitorScope, SettingsError> {
        match self.monitor_owner.as_deref() {
            None => Ok(MonitorScope::AllOwners),
            Some(raw) => UserId::new(raw)
                .map(MonitorScope::Owner)
                .map_err(|_| SettingsError::MonitorOwner(raw.to_owned())),
        }
    }

    /// Session key file path.
    #[must_use]
    pub fn session_key_file(&self) -> PathBuf {
        self.session_key_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_KEY_FILE))
    }

    /// Whether the session cookie carries the `Secure` attribute.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure.unwrap_or(true)
    }

    /// Whether a missing session key file may be replaced by a generated key.
    #[must_use]
    pub fn session_allow_ephemeral(&self) -> bool {
        self.session_allow_ephemeral.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration parsing.

    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    use super::*;

    const KEYS: [&str; 8] = [
        "ISOLATION_BIND_ADDR",
        "ISOLATION_DATABASE_URL",
        "ISOLATION_MONITOR_INTERVAL_SECS",
        "ISOLATION_WARNING_DEDUP",
        "ISOLATION_MONITOR_OWNER",
        "ISOLATION_SESSION_KEY_FILE",
        "ISOLATION_SESSION_COOKIE_SECURE",
        "ISOLATION_SESSION_ALLOW_EPHEMERAL",
    ];

    fn cleared_except(overrides: &[(&'static str, &str)]) -> Vec<(&'static str, Option<String>)> {
        KEYS.iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| (*value).to_owned());
                (*key, value)
            })
            .collect()
    }

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("isolation-backend")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(cleared_except(&[]));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.bind_addr().expect("default bind addr"),
            "0.0.0.0:8080".parse().expect("socket addr")
        );
        assert!(settings.database_url.is_none());
        assert_eq!(settings.monitor_interval(), Duration::from_secs(60));
        assert_eq!(settings.warning_dedup(), Ok(WarningDedup::Session));
        assert_eq!(settings.monitor_scope(), Ok(MonitorScope::AllOwners));
        assert_eq!(
            settings.session_key_file(),
            PathBuf::from(DEFAULT_SESSION_KEY_FILE)
        );
        assert!(settings.session_cookie_secure());
        assert!(!settings.session_allow_ephemeral());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let owner = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
        let _guard = lock_env(cleared_except(&[
            ("ISOLATION_BIND_ADDR", "127.0.0.1:9090"),
            ("ISOLATION_DATABASE_URL", "postgres://localhost/isolations"),
            ("ISOLATION_MONITOR_INTERVAL_SECS", "15"),
            ("ISOLATION_WARNING_DEDUP", "durable"),
            ("ISOLATION_MONITOR_OWNER", owner),
            ("ISOLATION_SESSION_COOKIE_SECURE", "false"),
            ("ISOLATION_SESSION_ALLOW_EPHEMERAL", "true"),
        ]));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            "127.0.0.1:9090".parse().expect("socket addr")
        );
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/isolations")
        );
        assert_eq!(settings.monitor_interval(), Duration::from_secs(15));
        assert_eq!(settings.warning_dedup(), Ok(WarningDedup::Durable));
        assert_eq!(
            settings.monitor_scope(),
            Ok(MonitorScope::Owner(UserId::new(owner).expect("owner id")))
        );
        assert!(!settings.session_cookie_secure());
        assert!(settings.session_allow_ephemeral());
    }

    #[rstest]
    #[case("ISOLATION_WARNING_DEDUP", "forever")]
    #[case("ISOLATION_MONITOR_OWNER", "nobody")]
    #[case("ISOLATION_BIND_ADDR", "localhost")]
    fn invalid_values_are_reported(#[case] key: &'static str, #[case] value: &str) {
        let _guard = lock_env(cleared_except(&[(key, value)]));

        let settings = load_from_empty_args();

        let failed = settings.warning_dedup().is_err()
            || settings.monitor_scope().is_err()
            || settings.bind_addr().is_err();
        assert!(failed, "{key}={value} should be rejected");
    }
}
