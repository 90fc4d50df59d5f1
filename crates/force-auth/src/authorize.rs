//! Browser-facing URLs of the login flow

use reqwest::Url;

use crate::config::OAuthConfig;
use crate::constants::{AUTHORIZE_PATH, LOGOUT_PATH};
use crate::error::{Error, Result};
use crate::token::AuthInfo;

/// Build the authorize URL the browser is redirected to when no session exists.
///
/// `redirect_url` is this application's callback; the provider sends the
/// browser back there with `?code=...`.
pub fn authorize_url(config: &OAuthConfig, redirect_url: &str) -> Result<String> {
    let url = Url::parse_with_params(
        &config.endpoint(AUTHORIZE_PATH),
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", redirect_url),
        ],
    )
    .map_err(|e| Error::InvalidUrl(format!("authorize endpoint: {e}")))?;
    Ok(url.into())
}

/// The provider's browser logout page for the tenant the session belongs to.
pub fn logout_url(auth: &AuthInfo) -> String {
    format!("{}{}", auth.instance_url.trim_end_matches('/'), LOGOUT_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Secret;
    use std::collections::HashMap;

    fn test_config() -> OAuthConfig {
        OAuthConfig::new("3MVG9-client", Secret::new("secret".into()))
            .with_login_url("https://test.salesforce.com")
    }

    #[test]
    fn authorize_url_contains_required_params() {
        let url = authorize_url(&test_config(), "http://localhost:9000/").unwrap();
        assert!(url.starts_with("https://test.salesforce.com/services/oauth2/authorize?"));

        let parsed = Url::parse(&url).unwrap();
        let params: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "3MVG9-client");
        assert_eq!(params["redirect_uri"], "http://localhost:9000/");
    }

    #[test]
    fn authorize_url_encodes_redirect_uri() {
        let url = authorize_url(&test_config(), "https://portal.example.com/").unwrap();
        assert!(
            url.contains("redirect_uri=https%3A%2F%2Fportal.example.com%2F"),
            "redirect_uri must be percent-encoded: {url}"
        );
    }

    #[test]
    fn authorize_url_rejects_garbage_login_url() {
        let config = test_config().with_login_url("not a url");
        assert!(matches!(
            authorize_url(&config, "http://localhost/"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn logout_url_uses_instance() {
        let auth = AuthInfo::new("tok", "https://na1.crm.example/");
        assert_eq!(logout_url(&auth), "https://na1.crm.example/secur/logout.jsp");
    }
}
