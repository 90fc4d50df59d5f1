//! Error types for CRM REST calls

/// Errors from the account gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The CRM rejected the session (expired or revoked token, wrong instance).
    #[error("remote auth error: {0}")]
    RemoteAuth(String),

    /// An update was not acknowledged with 204; `body` is the CRM's response verbatim.
    #[error("remote request failed ({status}): {body}")]
    RemoteRequest { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid instance URL: {0}")]
    InvalidInstanceUrl(String),

    #[error("account id is required for update")]
    MissingId,
}

/// Result alias for gateway operations.
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
