//! Per-browser session store
//!
//! The whole session lives in one private (encrypted and authenticated)
//! cookie as JSON. Nothing is kept server-side, so a restart with the same
//! key keeps everyone logged in and a restart with an ephemeral key logs
//! everyone out.

use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use force_auth::AuthInfo;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::config::SessionConfig;

/// Cookie settings and the encryption key, built once at startup.
#[derive(Clone)]
pub struct SessionSettings {
    pub key: Key,
    pub cookie_name: String,
    pub secure: bool,
    pub max_age: Option<Duration>,
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("key", &"[REDACTED]")
            .field("cookie_name", &self.cookie_name)
            .field("secure", &self.secure)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl SessionSettings {
    pub fn from_config(config: &SessionConfig) -> common::Result<Self> {
        let key = match config.key {
            Some(ref bytes) => Key::try_from(bytes.expose().as_slice())
                .map_err(|e| common::Error::Config(format!("invalid session key: {e}")))?,
            None => {
                warn!("no session key configured, generating an ephemeral one; sessions will not survive a restart");
                Key::generate()
            }
        };

        Ok(Self {
            key,
            cookie_name: config.cookie_name.clone(),
            secure: config.secure,
            max_age: config
                .max_age_secs
                .map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))),
        })
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        let mut builder = Cookie::build((self.cookie_name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/");
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }
        builder.build()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    }
}

/// What the portal remembers about one browser.
///
/// Token and instance URL are both present or both absent: they only ever
/// travel together inside `auth`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthInfo>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub logged_at: Option<OffsetDateTime>,
    /// Where to send the browser once the code exchange succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_redirect: Option<String>,
}

impl Session {
    /// Decode the session from the jar. A missing, tampered or unreadable
    /// cookie yields an empty session.
    pub fn load(jar: &PrivateCookieJar, settings: &SessionSettings) -> Self {
        let Some(cookie) = jar.get(&settings.cookie_name) else {
            return Self::default();
        };
        match serde_json::from_str(cookie.value()) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "discarding unreadable session cookie");
                Self::default()
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Record a successful login.
    pub fn start(&mut self, auth: AuthInfo) {
        self.auth = Some(auth);
        self.logged_at = Some(OffsetDateTime::now_utc());
    }

    pub fn stash_redirect(&mut self, target: String) {
        self.pending_redirect = Some(target);
    }

    pub fn take_redirect(&mut self) -> Option<String> {
        self.pending_redirect.take()
    }

    /// Write the session back into the jar.
    #[must_use]
    pub fn save(&self, jar: PrivateCookieJar, settings: &SessionSettings) -> PrivateCookieJar {
        match serde_json::to_string(self) {
            Ok(value) => jar.add(settings.cookie(value)),
            Err(e) => {
                warn!(error = %e, "failed to encode session, leaving cookie unchanged");
                jar
            }
        }
    }

    /// Drop the session cookie entirely.
    #[must_use]
    pub fn clear(jar: PrivateCookieJar, settings: &SessionSettings) -> PrivateCookieJar {
        jar.remove(settings.removal_cookie())
    }
}
