//! Portal routes: login entry, logout and the account pages
//!
//! Every handler is stateless per request. Gated handlers receive the
//! session's token through `AuthContext` and make at most one CRM call.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, FromRef, Path, Query, State};
use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use force_api::{Account, AccountFilter, ForceClient};
use force_auth::{OAuthConfig, authorize_url, exchange_code, logout_url, revoke_token};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::gate::{self, AuthContext};
use crate::lifecycle::{SessionAction, SessionEvent, SessionState, handle_event};
use crate::metrics::record_crm_call;
use crate::pages::Pages;
use crate::session::{Session, SessionSettings};

/// Shared state for the portal routes, built once at startup.
#[derive(Clone)]
pub struct PortalState {
    pub http: reqwest::Client,
    pub oauth: Arc<OAuthConfig>,
    pub crm: ForceClient,
    pub pages: Arc<Pages>,
    pub session: SessionSettings,
    /// External base URL for the OAuth callback; `None` derives it per request.
    pub public_url: Option<String>,
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<PortalState> for Key {
    fn from_ref(state: &PortalState) -> Self {
        state.session.key.clone()
    }
}

pub fn router(state: PortalState) -> Router {
    let gated = Router::new()
        .route("/accounts", get(list_accounts))
        .route("/account/update", post(update_account))
        .route("/account/{id}", get(show_account))
        .route("/account/{id}/edit", get(edit_account))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gate::require_session,
        ));

    Router::new()
        .route("/", get(index))
        .route("/logout", get(logout))
        .merge(gated)
        .with_state(state)
}

/// 302 Found with a Location header.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_owned())]).into_response()
}

/// The callback the provider redirects back to: the configured public URL,
/// or this request's own origin.
pub fn callback_url(headers: &HeaderMap, public_url: Option<&str>) -> String {
    if let Some(base) = public_url {
        return format!("{}/", base.trim_end_matches('/'));
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let scheme = header("x-forwarded-proto").unwrap_or("http");
    let host = header(HOST.as_str()).unwrap_or("localhost");
    format!("{scheme}://{host}/")
}

/// Portal path of one account, with the id percent-encoded.
fn account_path(id: &str) -> String {
    format!("/account/{}", urlencoding::encode(id))
}

fn api_outcome(e: &force_api::Error) -> &'static str {
    match e {
        force_api::Error::RemoteAuth(_) | force_api::Error::RemoteRequest { .. } => "remote_error",
        force_api::Error::Timeout(_) => "timeout",
        force_api::Error::MissingId => "invalid_request",
        force_api::Error::Http(_)
        | force_api::Error::InvalidResponse(_)
        | force_api::Error::InvalidInstanceUrl(_) => "transport_error",
    }
}

fn auth_outcome(e: &force_auth::Error) -> &'static str {
    match e {
        force_auth::Error::TokenExchange(_) | force_auth::Error::Revoke(_) => "remote_error",
        force_auth::Error::Timeout(_) => "timeout",
        force_auth::Error::Http(_)
        | force_auth::Error::InvalidResponse(_)
        | force_auth::Error::InvalidUrl(_) => "transport_error",
    }
}

/// Count a gateway call by outcome and pass its result through.
fn observe<T>(operation: &'static str, result: force_api::Result<T>) -> force_api::Result<T> {
    record_crm_call(
        operation,
        result.as_ref().map_or_else(api_outcome, |_| "ok"),
    );
    result
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// `GET /`: start the login, finish it when the provider calls back, or show
/// the landing page.
async fn index(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
    Query(params): Query<EntryParams>,
) -> Result<Response, AppError> {
    let mut session = Session::load(&jar, &state.session);
    let current = SessionState::of(&session);

    let event = match params.error {
        Some(_) if current == SessionState::Anonymous => SessionEvent::ProviderDenied,
        _ => SessionEvent::Entry {
            code: params.code.filter(|c| !c.is_empty()),
        },
    };

    let (pending, action) = handle_event(current, event);
    match action {
        SessionAction::RedirectToAuthorize { .. } => {
            let callback = callback_url(&headers, state.public_url.as_deref());
            Ok(found(&authorize_url(&state.oauth, &callback)?))
        }
        SessionAction::ExchangeCode { code } => {
            let callback = callback_url(&headers, state.public_url.as_deref());
            let exchanged = exchange_code(&state.http, &state.oauth, &code, &callback).await;
            record_crm_call(
                "token_exchange",
                exchanged.as_ref().map_or_else(auth_outcome, |_| "ok"),
            );

            let auth = match exchanged {
                Ok(auth) => auth,
                Err(e) => {
                    let (_, action) = handle_event(pending, SessionEvent::ExchangeFailed);
                    debug!(?action, "code exchange failed");
                    return Err(AppError::Auth(e));
                }
            };

            let (_, action) = handle_event(pending, SessionEvent::ExchangeSucceeded);
            debug!(?action, "code exchange succeeded");
            info!(instance_url = %auth.instance_url, "session started");
            session.start(auth);
            let target = session.take_redirect();
            let jar = session.save(jar, &state.session);
            match target {
                Some(target) => Ok((jar, found(&target)).into_response()),
                None => Ok((jar, state.pages.index(&session)?).into_response()),
            }
        }
        SessionAction::ServeIndex => Ok(state.pages.index(&session)?.into_response()),
        SessionAction::RespondUnauthorized => {
            let reason = params
                .error_description
                .or(params.error)
                .unwrap_or_else(|| "authorization denied".to_string());
            Err(AppError::ProviderDenied(reason))
        }
        other => {
            warn!(action = ?other, "unexpected entry action");
            Err(AppError::Unauthenticated)
        }
    }
}

/// `GET /logout`: revoke in the background, drop the cookie, and hand the
/// browser to the provider's logout page.
async fn logout(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let session = Session::load(&jar, &state.session);
    let (_, action) = handle_event(SessionState::of(&session), SessionEvent::Logout);

    match (action, session.auth) {
        (SessionAction::EndSession, Some(auth)) => {
            let destination = logout_url(&auth);
            let http = state.http.clone();
            tokio::spawn(async move {
                match revoke_token(&http, &auth).await {
                    Ok(()) => record_crm_call("revoke", "ok"),
                    Err(e) => {
                        record_crm_call("revoke", auth_outcome(&e));
                        debug!(error = %e, "token revocation failed");
                    }
                }
            });
            info!("session ended");
            let jar = Session::clear(jar, &state.session);
            Ok((jar, found(&destination)).into_response())
        }
        _ => Err(AppError::NotFound),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountsParams {
    country: Option<String>,
    id: Option<String>,
}

/// `GET /accounts?country=`
async fn list_accounts(
    State(state): State<PortalState>,
    AuthContext(auth): AuthContext,
    Query(params): Query<AccountsParams>,
) -> Result<Html<String>, AppError> {
    let filter = AccountFilter::from_parts(params.country.as_deref(), params.id.as_deref());
    let accounts = observe("list_accounts", state.crm.list_accounts(&auth, &filter).await)?;
    state.pages.accounts(&accounts, params.country.as_deref())
}

async fn fetch_account(
    state: &PortalState,
    auth: &force_auth::AuthInfo,
    id: String,
) -> Result<Account, AppError> {
    let accounts = observe(
        "get_account",
        state.crm.list_accounts(auth, &AccountFilter::Id(id)).await,
    )?;
    accounts.into_iter().next().ok_or(AppError::NotFound)
}

/// `GET /account/{id}`
async fn show_account(
    State(state): State<PortalState>,
    AuthContext(auth): AuthContext,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let account = fetch_account(&state, &auth, id).await?;
    state.pages.account(&account)
}

/// `GET /account/{id}/edit`
async fn edit_account(
    State(state): State<PortalState>,
    AuthContext(auth): AuthContext,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let account = fetch_account(&state, &auth, id).await?;
    state.pages.edit_account(&account)
}

/// `POST /account/update`: form fields use the CRM's field names.
async fn update_account(
    State(state): State<PortalState>,
    AuthContext(auth): AuthContext,
    Form(account): Form<Account>,
) -> Result<Response, AppError> {
    observe(
        "update_account",
        state.crm.update_account(&auth, &account).await,
    )?;
    info!(account_id = %account.id, "account updated");
    Ok(found(&account_path(&account.id)))
}
