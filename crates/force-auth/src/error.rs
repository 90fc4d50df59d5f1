//! Error types for OAuth operations

/// Errors from the authorization-code flow.
///
/// Any of these means the caller is still unauthenticated and must restart
/// the browser redirect.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token request timed out: {0}")]
    Timeout(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token revoke rejected: {0}")]
    Revoke(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn from_transport(context: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(format!("{context}: {e}"))
        } else {
            Self::Http(format!("{context}: {e}"))
        }
    }
}
