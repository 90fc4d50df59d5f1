//! Identity provider endpoints
//!
//! The login host differs between production orgs and sandboxes; everything
//! after the host is fixed by the provider. Revocation and the browser logout
//! page live on the per-tenant instance URL returned by the token exchange.

/// Production login host
pub const PRODUCTION_LOGIN_URL: &str = "https://login.salesforce.com";

/// Sandbox login host (default for the portal)
pub const SANDBOX_LOGIN_URL: &str = "https://test.salesforce.com";

/// Browser redirect target that starts the authorization-code flow
pub const AUTHORIZE_PATH: &str = "/services/oauth2/authorize";

/// Code exchange endpoint
pub const TOKEN_PATH: &str = "/services/oauth2/token";

/// Token revocation endpoint (relative to the instance URL)
pub const REVOKE_PATH: &str = "/services/oauth2/revoke";

/// Browser logout page (relative to the instance URL)
pub const LOGOUT_PATH: &str = "/secur/logout.jsp";
