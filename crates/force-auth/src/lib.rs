//! CRM identity provider client
//!
//! The pieces of the OAuth2 authorization-code flow the account portal
//! needs, and nothing more:
//!
//! 1. `authorize_url()` builds the browser redirect to the provider
//! 2. `exchange_code()` trades the returned code for an `AuthInfo`
//! 3. `revoke_token()` and `logout_url()` end the session on the provider side
//!
//! There is no refresh: an access token lives exactly as long as the
//! portal session that holds it.

pub mod authorize;
pub mod config;
pub mod constants;
pub mod error;
pub mod token;

pub use authorize::{authorize_url, logout_url};
pub use config::OAuthConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use token::{AuthInfo, exchange_code, revoke_token};
