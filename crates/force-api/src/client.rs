//! Account gateway over the CRM REST API
//!
//! Every call is a single request against the session's instance URL with
//! the session's bearer token. Nothing is retried or cached; the CRM is the
//! system of record.

use force_auth::AuthInfo;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::account::{Account, update_payload};
use crate::error::{Error, Result};
use crate::soql::{AccountFilter, account_query};

/// REST API version the portal was built against.
pub const DEFAULT_API_VERSION: &str = "v44.0";

/// Query endpoint response. `totalSize`, `done` and the rest are ignored.
#[derive(Debug, Deserialize)]
struct QueryResult {
    records: Vec<Account>,
}

/// Stateless client for the account endpoints.
///
/// Holds no credentials: the caller passes the `AuthInfo` of the current
/// session into every call, since each login may point at a different
/// tenant instance.
#[derive(Debug, Clone)]
pub struct ForceClient {
    http: reqwest::Client,
    api_version: String,
}

impl ForceClient {
    pub fn new(http: reqwest::Client, api_version: impl Into<String>) -> Self {
        Self {
            http,
            api_version: api_version.into(),
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// List accounts visible to the session, optionally filtered.
    pub async fn list_accounts(
        &self,
        auth: &AuthInfo,
        filter: &AccountFilter,
    ) -> Result<Vec<Account>> {
        let soql = account_query(filter);
        let url = self.api_url(auth, &["query", ""])?;
        debug!(query = %soql, "querying accounts");

        let response = self
            .http
            .get(url)
            .bearer_auth(auth.access_token.expose())
            .query(&[("q", soql.as_str())])
            .send()
            .await
            .map_err(|e| Error::from_transport("account query failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::from_transport("reading account query response", e))?;

        let accounts = parse_query_response(&body).inspect_err(|e| {
            warn!(%status, error = %e, "account query rejected");
        })?;
        debug!(count = accounts.len(), "accounts fetched");
        Ok(accounts)
    }

    /// Update one account.
    ///
    /// Sent as POST with `_HttpMethod=PATCH`, the provider's override for
    /// clients that cannot issue PATCH. Only `204 No Content` counts as
    /// success; any other response body is returned verbatim.
    pub async fn update_account(&self, auth: &AuthInfo, account: &Account) -> Result<()> {
        if account.id.is_empty() {
            return Err(Error::MissingId);
        }

        let mut url = self.api_url(auth, &["sobjects", "Account", account.id.as_str()])?;
        url.query_pairs_mut().append_pair("_HttpMethod", "PATCH");

        let response = self
            .http
            .post(url)
            .bearer_auth(auth.access_token.expose())
            .json(&update_payload(account))
            .send()
            .await
            .map_err(|e| Error::from_transport("account update failed", e))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!(account_id = %account.id, "account updated");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_transport("reading account update response", e))?;
        warn!(account_id = %account.id, %status, "account update rejected");
        Err(Error::RemoteRequest {
            status: status.as_u16(),
            body,
        })
    }

    /// `{instance_url}/services/data/{version}/{segments...}`
    fn api_url(&self, auth: &AuthInfo, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&auth.instance_url)
            .map_err(|e| Error::InvalidInstanceUrl(format!("{}: {e}", auth.instance_url)))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInstanceUrl(auth.instance_url.clone()))?
            .pop_if_empty()
            .extend(["services", "data", self.api_version.as_str()])
            .extend(segments);
        Ok(url)
    }
}

/// Interpret a query response body.
///
/// The CRM reports session problems either as an OAuth-style object with an
/// `error` field or as its REST error list (`[{"message", "errorCode"}]`);
/// both mean the token is no good for this instance.
fn parse_query_response(body: &str) -> Result<Vec<Account>> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(Error::RemoteAuth(message));
    }

    if let Some(errors) = value.as_array() {
        let first = errors.first();
        let field = |name: &str| {
            first
                .and_then(|e| e.get(name))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        return Err(Error::RemoteAuth(format!(
            "{}: {}",
            field("errorCode"),
            field("message")
        )));
    }

    let result: QueryResult =
        serde_json::from_value(value).map_err(|e| Error::InvalidResponse(e.to_string()))?;
    Ok(result.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Debug, Clone, Default)]
    struct Seen {
        path: String,
        params: HashMap<String, String>,
        authorization: String,
        body: String,
    }

    type Captured = Arc<Mutex<Vec<Seen>>>;

    /// Mock CRM instance: answers the query endpoint with `query_body` and
    /// the update endpoint with `update_status`/`update_body`.
    async fn start_crm(
        query_body: &'static str,
        update_status: AxumStatus,
        update_body: &'static str,
    ) -> (String, Captured) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));

        let query_seen = captured.clone();
        let update_seen = captured.clone();
        let app = Router::new()
            .route(
                "/services/data/v44.0/query/",
                get(
                    move |Query(params): Query<HashMap<String, String>>,
                          headers: HeaderMap| async move {
                        query_seen.lock().unwrap().push(Seen {
                            path: "/services/data/v44.0/query/".into(),
                            params,
                            authorization: header(&headers),
                            body: String::new(),
                        });
                        ([(axum::http::header::CONTENT_TYPE, "application/json")], query_body)
                    },
                ),
            )
            .route(
                "/services/data/v44.0/sobjects/Account/{id}",
                post(
                    move |Path(id): Path<String>,
                          Query(params): Query<HashMap<String, String>>,
                          headers: HeaderMap,
                          body: Bytes| async move {
                        update_seen.lock().unwrap().push(Seen {
                            path: format!("/services/data/v44.0/sobjects/Account/{id}"),
                            params,
                            authorization: header(&headers),
                            body: String::from_utf8_lossy(&body).into_owned(),
                        });
                        (update_status, update_body)
                    },
                ),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, captured)
    }

    fn header(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    const TWO_RECORDS: &str = r#"{
        "totalSize": 2,
        "done": true,
        "records": [
            {"attributes": {"type": "Account"}, "Id": "001A", "Name": "Acme", "Type": "Customer", "Industry": "Energy", "BillingCountry": "France"},
            {"attributes": {"type": "Account"}, "Id": "001B", "Name": "Globex", "Type": null, "Industry": null, "BillingCountry": "Germany"}
        ]
    }"#;

    fn client() -> ForceClient {
        ForceClient::new(reqwest::Client::new(), DEFAULT_API_VERSION)
    }

    #[tokio::test]
    async fn list_sends_bearer_and_unfiltered_query() {
        let (url, captured) = start_crm(TWO_RECORDS, AxumStatus::NO_CONTENT, "").await;
        let auth = AuthInfo::new("tok-1", url);

        let accounts = client().list_accounts(&auth, &AccountFilter::All).await.unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "001A");
        assert_eq!(accounts[1].name.as_deref(), Some("Globex"));

        let seen = captured.lock().unwrap();
        assert_eq!(seen[0].authorization, "Bearer tok-1");
        assert_eq!(
            seen[0].params["q"],
            "SELECT Id, Name, Type, Industry, BillingCountry FROM Account"
        );
    }

    #[tokio::test]
    async fn list_with_country_filter() {
        let (url, captured) = start_crm(TWO_RECORDS, AxumStatus::NO_CONTENT, "").await;
        let auth = AuthInfo::new("tok-1", url);

        client()
            .list_accounts(&auth, &AccountFilter::Country("France".into()))
            .await
            .unwrap();

        let seen = captured.lock().unwrap();
        assert!(seen[0].params["q"].ends_with("WHERE BillingCountry='France'"));
    }

    #[tokio::test]
    async fn list_tolerates_trailing_slash_on_instance() {
        let (url, captured) = start_crm(TWO_RECORDS, AxumStatus::NO_CONTENT, "").await;
        let auth = AuthInfo::new("tok-1", format!("{url}/"));

        client().list_accounts(&auth, &AccountFilter::All).await.unwrap();
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_error_object_is_remote_auth() {
        let (url, _captured) = start_crm(
            r#"{"error":"invalid_session","error_description":"expired"}"#,
            AxumStatus::NO_CONTENT,
            "",
        )
        .await;
        let auth = AuthInfo::new("stale", url);

        match client().list_accounts(&auth, &AccountFilter::All).await {
            Err(Error::RemoteAuth(msg)) => assert_eq!(msg, "invalid_session"),
            other => panic!("expected RemoteAuth, got {other:?}"),
        }
    }

    #[test]
    fn error_list_is_remote_auth() {
        let body = r#"[{"message":"Session expired or invalid","errorCode":"INVALID_SESSION_ID"}]"#;
        match parse_query_response(body) {
            Err(Error::RemoteAuth(msg)) => {
                assert_eq!(msg, "INVALID_SESSION_ID: Session expired or invalid")
            }
            other => panic!("expected RemoteAuth, got {other:?}"),
        }
    }

    #[test]
    fn garbage_body_is_invalid_response() {
        assert!(matches!(
            parse_query_response("<html>maintenance</html>"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_query_response(r#"{"totalSize":0}"#),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn list_against_dead_instance_is_http_error() {
        let auth = AuthInfo::new("tok", "http://127.0.0.1:1");
        let result = client().list_accounts(&auth, &AccountFilter::All).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn list_rejects_unparseable_instance_url() {
        let auth = AuthInfo::new("tok", "not a url");
        let result = client().list_accounts(&auth, &AccountFilter::All).await;
        assert!(matches!(result, Err(Error::InvalidInstanceUrl(_))));
    }

    #[tokio::test]
    async fn update_posts_patch_override_without_id_in_body() {
        let (url, captured) = start_crm(TWO_RECORDS, AxumStatus::NO_CONTENT, "").await;
        let auth = AuthInfo::new("tok-2", url);
        let account = Account {
            id: "001A".into(),
            name: Some("Acme Renamed".into()),
            billing_country: Some("Spain".into()),
            ..Default::default()
        };

        client().update_account(&auth, &account).await.unwrap();

        let seen = captured.lock().unwrap();
        assert_eq!(seen[0].path, "/services/data/v44.0/sobjects/Account/001A");
        assert_eq!(seen[0].params["_HttpMethod"], "PATCH");
        assert_eq!(seen[0].authorization, "Bearer tok-2");

        let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
        assert!(body.get("Id").is_none());
        assert!(body.get("id").is_none());
        assert_eq!(body["Name"], "Acme Renamed");
        assert_eq!(body["BillingCountry"], "Spain");
    }

    #[tokio::test]
    async fn update_non_204_returns_body_verbatim() {
        let rejection = r#"[{"message":"Name: data value too large","errorCode":"STRING_TOO_LONG","fields":["Name"]}]"#;
        let (url, _captured) = start_crm(TWO_RECORDS, AxumStatus::BAD_REQUEST, rejection).await;
        let auth = AuthInfo::new("tok", url);
        let account = Account {
            id: "001A".into(),
            ..Default::default()
        };

        match client().update_account(&auth, &account).await {
            Err(Error::RemoteRequest { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, rejection);
            }
            other => panic!("expected RemoteRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncated_rejection_body_is_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Consume the whole request before answering.
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some((head, body)) = text.split_once("\r\n\r\n") {
                    let length = head
                        .lines()
                        .find_map(|line| {
                            let line = line.to_ascii_lowercase();
                            line.strip_prefix("content-length:")
                                .map(|v| v.trim().to_string())
                        })
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if body.len() >= length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            stream
                .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 64\r\n\r\n[{\"message\"")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });

        let auth = AuthInfo::new("tok", url);
        let account = Account {
            id: "001A".into(),
            ..Default::default()
        };
        let result = client().update_account(&auth, &account).await;
        assert!(matches!(result, Err(Error::Http(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn update_200_is_not_success() {
        let (url, _captured) = start_crm(TWO_RECORDS, AxumStatus::OK, "ok").await;
        let auth = AuthInfo::new("tok", url);
        let account = Account {
            id: "001A".into(),
            ..Default::default()
        };

        let result = client().update_account(&auth, &account).await;
        assert!(matches!(result, Err(Error::RemoteRequest { status: 200, .. })));
    }

    #[tokio::test]
    async fn update_without_id_makes_no_call() {
        let (url, captured) = start_crm(TWO_RECORDS, AxumStatus::NO_CONTENT, "").await;
        let auth = AuthInfo::new("tok", url);

        let result = client().update_account(&auth, &Account::default()).await;
        assert!(matches!(result, Err(Error::MissingId)));
        assert!(captured.lock().unwrap().is_empty());
    }
}
