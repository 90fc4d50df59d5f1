//! Authentication gate
//!
//! Middleware in front of every account route. An authenticated session is
//! decoded once and handed to the handler as an `AuthContext` request
//! extension; anything else is bounced to the provider's authorize page with
//! the original target remembered for after the login.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::Method;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use force_auth::{AuthInfo, authorize_url};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::lifecycle::{SessionAction, SessionEvent, SessionState, handle_event};
use crate::portal::{PortalState, callback_url, found};
use crate::session::Session;

/// Token and instance of the current request's session.
///
/// Only present on requests that passed `require_session`; extracting it
/// anywhere else rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthContext(pub AuthInfo);

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Path and query to resume after login. Only safe, replayable requests are
/// remembered: the provider sends the browser back with a GET.
pub fn resumable_target(request: &Request) -> Option<String> {
    let method = request.method();
    if *method != Method::GET && *method != Method::HEAD {
        return None;
    }
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .filter(|target| target.starts_with('/'))
}

pub async fn require_session(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let mut session = Session::load(&jar, &state.session);
    let target = resumable_target(&request);

    let (_, action) = handle_event(
        SessionState::of(&session),
        SessionEvent::ProtectedRequest { target },
    );

    match action {
        SessionAction::Forward => {
            if let Some(auth) = session.auth {
                request.extensions_mut().insert(AuthContext(auth));
            }
            next.run(request).await
        }
        SessionAction::RedirectToAuthorize { stash } => {
            let callback = callback_url(request.headers(), state.public_url.as_deref());
            let url = match authorize_url(&state.oauth, &callback) {
                Ok(url) => url,
                Err(e) => return AppError::Auth(e).into_response(),
            };
            debug!(stash = ?stash, "no session, redirecting to authorize");
            if let Some(target) = stash {
                session.stash_redirect(target);
            }
            let jar = session.save(jar, &state.session);
            (jar, found(&url)).into_response()
        }
        other => {
            warn!(action = ?other, "unexpected gate action");
            AppError::Unauthenticated.into_response()
        }
    }
}
