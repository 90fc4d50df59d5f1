//! Account gateway for the CRM REST API
//!
//! Lists accounts through the SOQL query endpoint and updates single
//! records through the sObject endpoint. Authentication is supplied per call
//! as a `force_auth::AuthInfo`.

pub mod account;
pub mod client;
pub mod error;
pub mod soql;

pub use account::{Account, update_payload};
pub use client::{DEFAULT_API_VERSION, ForceClient};
pub use error::{Error, Result};
pub use soql::{AccountFilter, account_query};
