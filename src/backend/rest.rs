//! HTTP transport for a PostgREST-style hosted backend.
//!
//! Requires the `http` feature. Uses reqwest.
//!
//! ## Endpoints
//!
//! - `GET|POST|PATCH|DELETE /rest/v1/:table` : rows, filters as `column=op.value`
//! - `POST /storage/v1/object/:bucket/:path` : uploads
//! - `GET /storage/v1/object/public/:bucket/:path` : public object URLs
//! - `POST /auth/v1/token?grant_type=password`, `/auth/v1/signup`, `/auth/v1/logout`

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Auth, Backend, BackendError, FileStore, Filter, Query, Session};
use crate::config::BackendConfig;
use crate::record::Row;

/// Backend client speaking the hosted service's REST dialect.
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<Session>>,
}

#[derive(Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct AuthBody {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<UserBody>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.anon_key.clone(),
            session: RwLock::new(None),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Attach the api key and the session token (or the api key when signed out).
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.api_key.clone());
        request.header("apikey", &self.api_key).bearer_auth(token)
    }

    fn filter_params(filter: &Filter) -> Vec<(String, String)> {
        filter
            .conditions()
            .iter()
            .map(|c| {
                (
                    c.column.clone(),
                    format!("{}.{}", c.op.as_str(), render_value(&c.value)),
                )
            })
            .collect()
    }

    fn store_session(&self, session: Option<Session>) {
        *self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session;
    }

    async fn authenticate(&self, url: String, email: &str, password: &str) -> Result<Session, BackendError> {
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;
        let body: AuthBody = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Payload(e.to_string()))?;

        let access_token = body
            .access_token
            .ok_or_else(|| BackendError::Unauthorized("email confirmation required".into()))?;
        let (user_id, user_email) = match body.user {
            Some(user) => (user.id, user.email),
            None => (
                body.id
                    .ok_or_else(|| BackendError::Payload("auth response without user".into()))?,
                body.email,
            ),
        };

        let session = Session {
            user_id,
            email: user_email.unwrap_or_else(|| email.to_string()),
            access_token,
        };
        self.store_session(Some(session.clone()));
        Ok(session)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(Self::filter_params(&query.filter));
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".into(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".into(), limit.to_string()));
        }

        let response = self
            .authorize(self.client.get(self.rest_url(table)).query(&params))
            .send()
            .await
            .map_err(transport_error)?;
        rows(check(response).await?).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, BackendError> {
        let response = self
            .authorize(self.client.post(self.rest_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(transport_error)?;
        rows(check(response).await?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Payload(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, patch: Row, filter: &Filter) -> Result<u64, BackendError> {
        let response = self
            .authorize(self.client.patch(self.rest_url(table)))
            .query(&Self::filter_params(filter))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(rows(check(response).await?).await?.len() as u64)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, BackendError> {
        let response = self
            .authorize(self.client.delete(self.rest_url(table)))
            .query(&Self::filter_params(filter))
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(transport_error)?;
        Ok(rows(check(response).await?).await?.len() as u64)
    }
}

#[async_trait]
impl FileStore for RestBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BackendError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let response = self
            .authorize(self.client.post(url))
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await?;
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}

#[async_trait]
impl Auth for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.authenticate(self.auth_url("token?grant_type=password"), email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.authenticate(self.auth_url("signup"), email, password)
            .await
    }

    async fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.session().await.is_none() {
            return Ok(());
        }
        let response = self
            .authorize(self.client.post(self.auth_url("logout")))
            .send()
            .await
            .map_err(transport_error)?;
        // The local session is gone either way.
        self.store_session(None);
        check(response).await?;
        Ok(())
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_connect() {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Storage(err.to_string())
    }
}

/// Turn non-2xx responses into errors, keeping the backend's message.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout,
        s if s.is_client_error() => BackendError::Rejected(message),
        _ => BackendError::Storage(format!("{}: {}", status, message)),
    })
}

async fn rows(response: Response) -> Result<Vec<Row>, BackendError> {
    let body: Value = response
        .json()
        .await
        .map_err(|e| BackendError::Payload(e.to_string()))?;
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(BackendError::Payload(format!("expected row, got {}", other))),
            })
            .collect(),
        Value::Object(row) => Ok(vec![row]),
        other => Err(BackendError::Payload(format!("expected rows, got {}", other))),
    }
}
