//! Session lifecycle state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! Handlers and the gate execute the I/O implied by each action (redirects,
//! the code exchange, cookie writes, revocation).
//!
//! The state is never stored as such. It is derived from the session cookie
//! at the start of each request: a session holding an `AuthInfo` is
//! `Authenticated`, anything else is `Anonymous`. `PendingCode` only exists
//! between the exchange call and its outcome within one request, or between
//! the authorize redirect and the callback in the browser.

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No token in the session
    Anonymous,
    /// Sent to the provider, or holding a code not yet exchanged
    PendingCode,
    /// Token and instance URL present
    Authenticated,
}

impl SessionState {
    pub fn of(session: &Session) -> Self {
        if session.is_authenticated() {
            Self::Authenticated
        } else {
            Self::Anonymous
        }
    }
}

/// Events that drive session transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Request to `/`, possibly carrying the provider's `?code=`
    Entry { code: Option<String> },
    ExchangeSucceeded,
    ExchangeFailed,
    /// Provider sent the browser back with `?error=`
    ProviderDenied,
    /// Request to a gated route. `target` is the path to resume after login,
    /// if the request can be replayed.
    ProtectedRequest { target: Option<String> },
    Logout,
}

/// Actions the caller should execute after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// 302 to the provider's authorize endpoint, remembering `stash` if set
    RedirectToAuthorize { stash: Option<String> },
    /// Trade the code for a token (exactly once, no retry)
    ExchangeCode { code: String },
    /// Store the token, then go to the stashed target or render the index
    StartSession,
    RespondUnauthorized,
    ServeIndex,
    /// Let the gated request through
    Forward,
    /// Revoke in the background, clear the cookie, 302 to provider logout
    EndSession,
    NotFound,
    /// No-op
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: SessionState, event: SessionEvent) -> (SessionState, SessionAction) {
    match (state, event) {
        // --- Anonymous ---
        (SessionState::Anonymous, SessionEvent::Entry { code: None }) => (
            SessionState::PendingCode,
            SessionAction::RedirectToAuthorize { stash: None },
        ),

        (SessionState::Anonymous, SessionEvent::Entry { code: Some(code) }) => (
            SessionState::PendingCode,
            SessionAction::ExchangeCode { code },
        ),

        (SessionState::Anonymous, SessionEvent::ProviderDenied) => {
            (SessionState::Anonymous, SessionAction::RespondUnauthorized)
        }

        (SessionState::Anonymous, SessionEvent::ProtectedRequest { target }) => (
            SessionState::PendingCode,
            SessionAction::RedirectToAuthorize { stash: target },
        ),

        (SessionState::Anonymous, SessionEvent::Logout) => {
            (SessionState::Anonymous, SessionAction::NotFound)
        }

        // --- PendingCode ---
        (SessionState::PendingCode, SessionEvent::ExchangeSucceeded) => {
            (SessionState::Authenticated, SessionAction::StartSession)
        }

        (SessionState::PendingCode, SessionEvent::ExchangeFailed) => {
            (SessionState::Anonymous, SessionAction::RespondUnauthorized)
        }

        // --- Authenticated ---
        (SessionState::Authenticated, SessionEvent::Entry { .. }) => {
            (SessionState::Authenticated, SessionAction::ServeIndex)
        }

        (SessionState::Authenticated, SessionEvent::ProtectedRequest { .. }) => {
            (SessionState::Authenticated, SessionAction::Forward)
        }

        (SessionState::Authenticated, SessionEvent::Logout) => {
            (SessionState::Anonymous, SessionAction::EndSession)
        }

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, SessionAction::None),
    }
}
