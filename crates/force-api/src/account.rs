//! Account record
//!
//! Field names follow the CRM's API names (`Id`, `BillingCountry`, ...) both
//! on the wire and in the portal's edit form, so one type serves query
//! results, form submissions and update payloads.

use serde::{Deserialize, Serialize};

/// The subset of the CRM Account object the portal reads and edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "Type", skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_country: Option<String>,
}

/// Build the JSON body for an update.
///
/// The record id travels in the URL path; the API rejects it in the body,
/// so both spellings are stripped.
pub fn update_payload(account: &Account) -> serde_json::Value {
    let mut value = serde_json::to_value(account).unwrap_or_default();
    if let Some(object) = value.as_object_mut() {
        object.remove("Id");
        object.remove("id");
    }
    value
}
