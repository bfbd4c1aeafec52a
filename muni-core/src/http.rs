//! Authenticated JSON client.
//!
//! Every request carries the session's bearer token. A 401 triggers one
//! credential refresh and one replay of the request. Concurrent 401s share
//! the refresh: the first caller performs it behind `refresh_gate`, later
//! callers see the new access token and only replay.

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::SessionCell;
use muni_schema::TokenPair;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

pub const TOKEN_PAIR_PATH: &str = "/token/pair";
pub const TOKEN_REFRESH_PATH: &str = "/token/refresh";

/// A request that can be sent again verbatim after a refresh.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn is_credential_exchange(&self) -> bool {
        self.path == TOKEN_PAIR_PATH || self.path == TOKEN_REFRESH_PATH
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionCell>,
    refresh_gate: Mutex<()>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Arc<SessionCell>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                session,
                refresh_gate: Mutex::new(()),
            }),
        })
    }

    pub fn session(&self) -> &Arc<SessionCell> {
        &self.inner.session
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let sent_with = self.inner.session.access_token();
        let response = self.execute(request, sent_with.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || request.is_credential_exchange() {
            return decode(response).await;
        }

        warn!(path = %request.path, "401 received, refreshing credentials");
        self.refresh_after(sent_with.as_deref()).await?;

        let token = self.inner.session.access_token();
        let replay = self.execute(request, token.as_deref()).await?;
        decode(replay).await
    }

    pub async fn send_as<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_as(&ApiRequest::get(path)).await
    }

    /// Raw JSON, for payloads parsed by the caller (GIS collections).
    pub async fn get_json_value(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.send(&request).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send_as(&ApiRequest::post(path).json(body)).await
    }

    /// Exchanges the refresh token for a new pair, serialised with any
    /// refresh already in flight.
    pub async fn refresh_credentials(&self) -> Result<(), ApiError> {
        let _gate = self.inner.refresh_gate.lock().await;
        self.exchange_refresh_token().await
    }

    async fn refresh_after(&self, stale_access: Option<&str>) -> Result<(), ApiError> {
        let _gate = self.inner.refresh_gate.lock().await;
        let current = self.inner.session.access_token();
        if current.is_some() && current.as_deref() != stale_access {
            debug!("credentials already refreshed by a concurrent request");
            return Ok(());
        }
        self.exchange_refresh_token().await
    }

    async fn exchange_refresh_token(&self) -> Result<(), ApiError> {
        let session = &self.inner.session;
        let Some(refresh) = session.refresh_token() else {
            error!("no refresh token available, logging out");
            session.teardown();
            return Err(ApiError::NoRefreshToken);
        };

        let request = ApiRequest::post(TOKEN_REFRESH_PATH).json(json!({ "refresh": refresh }));
        let outcome = match self.execute(&request, None).await {
            Ok(response) => decode(response).await.and_then(|value| {
                serde_json::from_value::<RefreshResponse>(value)
                    .map_err(|e| ApiError::Decode(e.to_string()))
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(fresh) => {
                debug!("credentials refreshed");
                session.set_tokens(TokenPair {
                    access: fresh.access,
                    refresh: fresh.refresh.unwrap_or(refresh),
                });
                Ok(())
            }
            Err(e) => {
                error!("token refresh failed: {e}");
                session.teardown();
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        access: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.inner.base_url, request.path);
        debug!(method = %request.method, %url, "request");

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }
}

async fn decode(response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response.text().await?;

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()));
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(url)),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let parsed = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);
            Err(ApiError::from_validation_body(&parsed))
        }
        other => Err(ApiError::Status {
            status: other.as_u16(),
            body,
        }),
    }
}
