//! REST client for the hosted backend.
//!
//! # Endpoints
//! - auth: `/auth/v1/user`, `/auth/v1/token?grant_type=password`,
//!   `/auth/v1/otp`, `/auth/v1/logout`
//! - tables: `/rest/v1/<table>` with `eq.`/`in.` filters
//! - storage: `/storage/v1/object/<bucket>/<path>`, public objects under
//!   `/storage/v1/object/public/<bucket>/<path>`
//!
//! Every call goes through the secured [`HttpClient`] chain.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::backend::query::{Filter, Query, Row};
use crate::backend::{AuthApi, Credential, Session, SignInOutcome, StorageApi, TableApi};
use crate::client::{HttpClient, HttpRequest, HttpResponse};
use crate::error::{GuardError, GuardResult};
use crate::persist::KeyValueStore;

/// Durable store key for the signed-in session.
pub const SESSION_STORE_KEY: &str = "auth.session";

/// Session material kept between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    user: UserBody,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    #[serde(rename = "Key")]
    key: Option<String>,
}

/// Hosted backend reached over HTTP.
pub struct RestBackend {
    client: Arc<dyn HttpClient>,
    base_url: Url,
    anon_key: String,
    durable: Arc<dyn KeyValueStore>,
}

impl RestBackend {
    pub fn new(
        client: Arc<dyn HttpClient>,
        base_url: &str,
        anon_key: impl Into<String>,
        durable: Arc<dyn KeyValueStore>,
    ) -> GuardResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GuardError::Config(format!("invalid backend URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GuardError::Config(format!("backend URL '{}' cannot be a base", base_url)));
        }
        Ok(Self {
            client,
            base_url,
            anon_key: anon_key.into(),
            durable,
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn stored_session(&self) -> GuardResult<Option<StoredSession>> {
        match self.durable.get(SESSION_STORE_KEY)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(stored) => Ok(Some(stored)),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable stored session");
                    self.durable.remove(SESSION_STORE_KEY)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn bearer(&self) -> GuardResult<String> {
        Ok(match self.stored_session()? {
            Some(stored) => stored.access_token,
            None => self.anon_key.clone(),
        })
    }

    fn build(
        &self,
        method: Method,
        url: &Url,
        bearer: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> GuardResult<HttpRequest> {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .header("apikey", self.anon_key.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", bearer));
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder
            .body(body)
            .map_err(|e| GuardError::Config(format!("malformed request: {}", e)))
    }

    fn json_body(value: &impl Serialize) -> GuardResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| GuardError::Config(format!("unserializable body: {}", e)))
    }

    async fn send_checked(&self, request: HttpRequest) -> GuardResult<HttpResponse> {
        let response = self.client.send(request).await?;
        check_status(response)
    }

    fn table_url(&self, table: &str, query: &Query, include_select: bool) -> Url {
        let mut url = self.endpoint(["rest", "v1", table]);
        {
            let mut pairs = url.query_pairs_mut();
            if include_select {
                pairs.append_pair("select", &query.columns);
            }
            for filter in &query.filters {
                let (column, expr) = filter_expr(filter);
                pairs.append_pair(column, &expr);
            }
            if let Some(order) = &query.order {
                let dir = if order.ascending { "asc" } else { "desc" };
                pairs.append_pair("order", &format!("{}.{}", order.column, dir));
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        url
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn filter_expr(filter: &Filter) -> (&str, String) {
    match filter {
        Filter::Eq { column, value: Value::Null } => (column.as_str(), "is.null".to_string()),
        Filter::Eq { column, value } => (column.as_str(), format!("eq.{}", literal(value))),
        Filter::In { column, values } => {
            let list: Vec<String> = values.iter().map(literal).collect();
            (column.as_str(), format!("in.({})", list.join(",")))
        }
    }
}

/// Best human-readable message from an error body.
fn error_message(response: &HttpResponse) -> String {
    if let Ok(Value::Object(body)) = serde_json::from_slice::<Value>(response.body()) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(Value::String(msg)) = body.get(key) {
                return msg.clone();
            }
        }
    }
    let text = String::from_utf8_lossy(response.body()).trim().to_string();
    if text.is_empty() {
        response
            .status()
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        text
    }
}

/// Map a response status to the error taxonomy.
fn check_status(response: HttpResponse) -> GuardResult<HttpResponse> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(&response);
    Err(match status {
        StatusCode::UNAUTHORIZED => GuardError::AuthFailure(message),
        StatusCode::FORBIDDEN => GuardError::AuthorizationFailure(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => GuardError::TransientBackend(message),
        s if s.is_server_error() => GuardError::TransientBackend(format!("{} ({})", message, s.as_u16())),
        s => GuardError::Backend {
            status: s.as_u16(),
            message,
        },
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> GuardResult<T> {
    serde_json::from_slice(response.body()).map_err(|e| GuardError::Backend {
        status: response.status().as_u16(),
        message: format!("unexpected response body: {}", e),
    })
}

#[async_trait]
impl AuthApi for RestBackend {
    async fn current_session(&self) -> GuardResult<Option<Session>> {
        let stored = match self.stored_session()? {
            Some(stored) => stored,
            None => return Ok(None),
        };

        let url = self.endpoint(["auth", "v1", "user"]);
        let request = self.build(Method::GET, &url, &stored.access_token, Vec::new(), None)?;
        let user: UserBody = match self.send_checked(request).await {
            Ok(response) => parse_json(&response)?,
            Err(GuardError::AuthFailure(reason)) | Err(GuardError::AuthorizationFailure(reason)) => {
                tracing::info!(reason = %reason, "Stored session rejected by backend");
                self.durable.remove(SESSION_STORE_KEY)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(Session::new(
            user.id,
            user.email.unwrap_or_default(),
            stored.issued_at,
            stored.expires_at,
        ))
    }

    async fn sign_in(&self, email: &str, credential: &Credential) -> GuardResult<SignInOutcome> {
        match credential {
            Credential::Password(password) => {
                let mut url = self.endpoint(["auth", "v1", "token"]);
                url.query_pairs_mut().append_pair("grant_type", "password");
                let body = Self::json_body(&serde_json::json!({ "email": email, "password": password }))?;
                let request = self.build(Method::POST, &url, &self.anon_key, body, Some("application/json"))?;

                let response = match self.send_checked(request).await {
                    Err(GuardError::Backend { status: 400, message }) => {
                        return Err(GuardError::AuthFailure(message));
                    }
                    other => other?,
                };
                let token: TokenBody = parse_json(&response)?;

                let issued_at = Utc::now();
                let expires_at = Duration::try_seconds(token.expires_in)
                    .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        GuardError::AuthFailure(format!("invalid expires_in: {}", token.expires_in))
                    })?;
                let stored = StoredSession {
                    access_token: token.access_token,
                    issued_at,
                    expires_at,
                };
                let session = Session::new(
                    token.user.id,
                    token.user.email.unwrap_or_else(|| email.to_string()),
                    stored.issued_at,
                    stored.expires_at,
                )
                .ok_or_else(|| GuardError::AuthFailure("backend returned an incomplete session".to_string()))?;

                let raw = serde_json::to_string(&stored)
                    .map_err(|e| GuardError::Config(format!("unserializable session: {}", e)))?;
                self.durable.set(SESSION_STORE_KEY, &raw)?;
                tracing::info!(subject = %session.subject_id(), "Signed in");
                Ok(SignInOutcome::SignedIn(session))
            }
            Credential::MagicLink => {
                let url = self.endpoint(["auth", "v1", "otp"]);
                let body = Self::json_body(&serde_json::json!({ "email": email }))?;
                let request = self.build(Method::POST, &url, &self.anon_key, body, Some("application/json"))?;
                self.send_checked(request).await?;
                tracing::info!("Magic link requested");
                Ok(SignInOutcome::LinkSent)
            }
        }
    }

    async fn sign_out(&self) -> GuardResult<()> {
        let stored = self.stored_session()?;
        // Local state goes first so a failed call still logs the user out.
        self.durable.remove(SESSION_STORE_KEY)?;

        if let Some(stored) = stored {
            let url = self.endpoint(["auth", "v1", "logout"]);
            let request = self.build(Method::POST, &url, &stored.access_token, Vec::new(), None)?;
            self.send_checked(request).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TableApi for RestBackend {
    async fn select(&self, table: &str, query: &Query) -> GuardResult<Vec<Row>> {
        let url = self.table_url(table, query, true);
        let request = self.build(Method::GET, &url, &self.bearer()?, Vec::new(), None)?;
        let response = self.send_checked(request).await?;
        parse_json(&response)
    }

    async fn insert(&self, table: &str, row: Row) -> GuardResult<Row> {
        let url = self.endpoint(["rest", "v1", table]);
        let body = Self::json_body(&row)?;
        let mut request = self.build(Method::POST, &url, &self.bearer()?, body, Some("application/json"))?;
        request
            .headers_mut()
            .insert("prefer", http::HeaderValue::from_static("return=representation"));

        let response = self.send_checked(request).await?;
        let mut rows: Vec<Row> = parse_json(&response)?;
        if rows.is_empty() {
            return Ok(row);
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, query: &Query, patch: Row) -> GuardResult<Vec<Row>> {
        let url = self.table_url(table, query, false);
        let body = Self::json_body(&patch)?;
        let mut request = self.build(Method::PATCH, &url, &self.bearer()?, body, Some("application/json"))?;
        request
            .headers_mut()
            .insert("prefer", http::HeaderValue::from_static("return=representation"));

        let response = self.send_checked(request).await?;
        parse_json(&response)
    }
}

#[async_trait]
impl StorageApi for RestBackend {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> GuardResult<String> {
        let url = self.endpoint(["storage", "v1", "object", bucket].into_iter().chain(path.split('/')));
        let mut request = self.build(Method::POST, &url, &self.bearer()?, bytes, Some(content_type))?;
        request
            .headers_mut()
            .insert(CACHE_CONTROL, http::HeaderValue::from_static("max-age=3600"));
        request
            .headers_mut()
            .insert("x-upsert", http::HeaderValue::from_static("true"));

        let response = match self.send_checked(request).await {
            Ok(response) => response,
            Err(GuardError::TransientBackend(msg)) => return Err(GuardError::TransientBackend(msg)),
            Err(e) => {
                let reason = match e {
                    GuardError::Backend { message, .. }
                    | GuardError::AuthFailure(message)
                    | GuardError::AuthorizationFailure(message) => message,
                    other => other.to_string(),
                };
                return Err(GuardError::StorageUnavailable(reason));
            }
        };

        let stored: StoredObject = parse_json(&response).unwrap_or(StoredObject { key: None });
        let prefix = format!("{}/", bucket);
        Ok(stored
            .key
            .map(|key| key.strip_prefix(&prefix).map(str::to_string).unwrap_or(key))
            .unwrap_or_else(|| path.to_string()))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(
            ["storage", "v1", "object", "public", bucket]
                .into_iter()
                .chain(path.split('/')),
        )
        .to_string()
    }
}
