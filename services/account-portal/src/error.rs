//! Request-level errors and their HTTP mapping
//!
//! Every handler returns `Result<_, AppError>`; the conversion to a response
//! happens once, here, and is logged with the request span in scope.

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    /// Code exchange with the identity provider failed.
    #[error("token error: {0}")]
    Auth(#[from] force_auth::Error),

    /// The provider sent the browser back with `?error=`.
    #[error("authorization denied: {0}")]
    ProviderDenied(String),

    #[error(transparent)]
    Api(#[from] force_api::Error),

    #[error("not found")]
    NotFound,

    #[error("failed to render page: {0}")]
    Render(String),

    /// A gated handler ran without an authenticated session.
    #[error("not authenticated")]
    Unauthenticated,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) | Self::ProviderDenied(_) | Self::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            Self::Api(api) => match api {
                force_api::Error::RemoteAuth(_) => StatusCode::UNAUTHORIZED,
                force_api::Error::RemoteRequest { .. } | force_api::Error::MissingId => {
                    StatusCode::BAD_REQUEST
                }
                force_api::Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                force_api::Error::Http(_)
                | force_api::Error::InvalidResponse(_)
                | force_api::Error::InvalidInstanceUrl(_) => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "token_error",
            Self::ProviderDenied(_) => "access_denied",
            Self::Unauthenticated => "unauthenticated",
            Self::Api(force_api::Error::RemoteAuth(_)) => "remote_auth_error",
            Self::Api(force_api::Error::RemoteRequest { .. }) => "remote_request_error",
            Self::Api(force_api::Error::MissingId) => "invalid_request",
            Self::Api(force_api::Error::Timeout(_)) => "crm_timeout",
            Self::Api(_) => "crm_error",
            Self::NotFound => "not_found",
            Self::Render(_) => "render_error",
        }
    }

    /// Message shown to the browser. Provider and transport details stay in
    /// the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Auth(_) => "token error".to_string(),
            Self::ProviderDenied(description) => description.clone(),
            Self::Api(force_api::Error::RemoteAuth(message)) => message.clone(),
            Self::Api(force_api::Error::Timeout(_)) => "CRM request timed out".to_string(),
            Self::Api(
                force_api::Error::Http(_)
                | force_api::Error::InvalidResponse(_)
                | force_api::Error::InvalidInstanceUrl(_),
            ) => "CRM request failed".to_string(),
            Self::Render(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON error body: {"error":{"type":"...","message":"..."}}
fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": kind,
            "message": message,
        }
    });
    (status, [(CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        match self {
            // Update rejections are passed through to the browser untouched.
            Self::Api(force_api::Error::RemoteRequest { body, .. }) => {
                (status, [(CONTENT_TYPE, "application/json")], body).into_response()
            }
            other => error_response(status, other.kind(), &other.public_message()),
        }
    }
}
