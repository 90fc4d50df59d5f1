//! Authorization-code exchange and token revocation
//!
//! The exchange POSTs to the login host's token endpoint. The provider
//! expects every parameter (including the client secret) in the query string
//! of that POST, not a form body, so that is what is sent.
//!
//! Revocation goes to the instance URL and is best-effort: the portal never
//! waits on it and never surfaces its failure.

use common::Secret;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OAuthConfig;
use crate::constants::{REVOKE_PATH, TOKEN_PATH};
use crate::error::{Error, Result};

/// Access token plus the tenant instance it is valid for.
///
/// Deserializes straight from the token endpoint response; any other fields
/// in that response (`id`, `issued_at`, `signature`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub access_token: Secret<String>,
    pub instance_url: String,
}

impl AuthInfo {
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            instance_url: instance_url.into(),
        }
    }
}

/// Exchange an authorization code for an access token.
///
/// `redirect_url` must be the same callback that was sent to the authorize
/// endpoint. Called exactly once per code; there is no retry.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    redirect_url: &str,
) -> Result<AuthInfo> {
    let response = client
        .post(config.endpoint(TOKEN_PATH))
        .query(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
            ("redirect_uri", redirect_url),
        ])
        .send()
        .await
        .map_err(|e| Error::from_transport("token exchange request failed", e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::from_transport("reading token response", e))?;

    if !status.is_success() {
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let auth: AuthInfo =
        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    info!(instance_url = %auth.instance_url, "authorization code exchanged");
    Ok(auth)
}

/// Revoke an access token.
pub async fn revoke_token(client: &reqwest::Client, auth: &AuthInfo) -> Result<()> {
    let endpoint = format!("{}{}", auth.instance_url.trim_end_matches('/'), REVOKE_PATH);

    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .query(&[("token", auth.access_token.expose().as_str())])
        .send()
        .await
        .map_err(|e| Error::from_transport("token revoke request failed", e))?;

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "token revoke rejected");
        return Err(Error::Revoke(format!("revoke returned {status}")));
    }

    debug!(instance_url = %auth.instance_url, "token revoked");
    Ok(())
}
