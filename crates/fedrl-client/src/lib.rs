//! fedrl-client: async HTTP client for the federated-learning backend.
//!
//! [`ApiClient`] owns the HTTP connection pool and the [`SessionManager`].
//! Every authenticated call goes through [`ApiClient::ensure_fresh_session`]
//! first, so an expired access token is swapped for a new one before the
//! request leaves.

pub mod api;
pub mod auth;

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use fedrl_core::{ClientConfig, FedrlError, Result, SessionManager};

pub use fedrl_core;

/// Backend client with an attached session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: Arc<Mutex<SessionManager>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: SessionManager) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .user_agent(concat!("fedrl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(http_error)?;

        Ok(Self {
            http,
            config: Arc::new(config),
            session: Arc::new(Mutex::new(session)),
        })
    }

    /// Client whose session lives in `config.session_file`.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let session = SessionManager::open(&config.session_file)?;
        Self::new(config, session)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared handle to the session, for reading identity or tokens.
    pub fn session(&self) -> Arc<Mutex<SessionManager>> {
        Arc::clone(&self.session)
    }

    /// Flush the session to storage. Other clones keep working.
    pub async fn dispose(self) -> Result<()> {
        match Arc::try_unwrap(self.session) {
            Ok(session) => session.into_inner().dispose(),
            Err(shared) => shared.lock().await.flush(),
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None).await
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Authenticated request. No retries: a failure is returned as-is.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let bearer = self.ensure_fresh_session().await?;
        let url = self.config.endpoint(path);
        debug!(%method, %url, authenticated = bearer.is_some(), "API request");

        let mut request = self.http.request(method, &url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(http_error)?;
        read_json(response).await
    }
}

pub(crate) fn http_error(e: reqwest::Error) -> FedrlError {
    FedrlError::Http(e.to_string())
}

/// The `detail` field DRF-style backends put in error bodies.
pub(crate) async fn error_detail(response: Response) -> Option<String> {
    let body: serde_json::Value = response.json().await.ok()?;
    body.get("detail")?.as_str().map(str::to_string)
}

/// Decode a success body, or turn a failure status into [`FedrlError::Api`].
/// An empty success body reads as JSON `null`.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let message = error_detail(response)
            .await
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        return Err(FedrlError::Api {
            status: status.as_u16(),
            message,
        });
    }
    let bytes = response.bytes().await.map_err(http_error)?;
    if bytes.is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}
