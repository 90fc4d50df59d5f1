//! Client credentials for the connected app

use common::Secret;

use crate::constants::SANDBOX_LOGIN_URL;

/// Connected-app credentials and the login host they belong to.
///
/// Built once at startup from configuration and shared read-only.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub login_url: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: Secret<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            login_url: SANDBOX_LOGIN_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into();
        self
    }

    /// Join a provider path onto the login host.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.login_url.trim_end_matches('/'), path)
    }
}
