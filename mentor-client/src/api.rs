//! HTTP plumbing shared by the gateway and the services.
//!
//! Every request carries the bearer token from the [`AuthStore`]. Failures
//! are classified into [`ApiError`] and go through a single reaction step:
//! a 401 clears the session, and unless the client is silent exactly one
//! notification is emitted. Services built on top must not notify again
//! for the same failure.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::notify::Notifier;
use crate::store::AuthStore;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    auth: AuthStore,
    notifier: Notifier,
    surface_errors: bool,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("surface_errors", &self.surface_errors)
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: &ClientConfig, auth: AuthStore, notifier: Notifier) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        debug!(base_url = %config.api_base_url, "API client initialized");
        Ok(Self {
            http,
            base_url: Arc::from(config.api_base_url.trim_end_matches('/')),
            auth,
            notifier,
            surface_errors: true,
        })
    }

    /// Same client, but failures are never surfaced as notifications.
    ///
    /// Meant for background work such as polling. A 401 still clears the
    /// session.
    pub fn silent(&self) -> Self {
        Self {
            surface_errors: false,
            ..self.clone()
        }
    }

    pub fn is_silent(&self) -> bool {
        !self.surface_errors
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::GET, path, |r| r).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.execute(Method::GET, path, |r| r.query(query)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, |r| r.json(body)).await
    }

    /// POST without a request body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::POST, path, |r| r).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::PUT, path, |r| r.json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::DELETE, path, |r| r).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        self.execute(Method::POST, path, |r| r.multipart(form)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let token = self.auth.token();
        let had_token = token.is_some();

        let mut request = build(self.http.request(method.clone(), &url));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        debug!(%method, %url, "API request");
        let result = send(request).await;
        if let Err(err) = &result {
            self.react(&method, &url, err, had_token);
        }
        result
    }

    fn react(&self, method: &Method, url: &str, err: &ApiError, had_token: bool) {
        warn!(%method, %url, category = ?err.category(), error = %err, "API request failed");

        if let ApiError::Authentication(message) = err {
            // Without a session the 401 is a credential rejection, not an expiry.
            if !had_token {
                if self.surface_errors {
                    self.notifier.error(message.clone());
                }
                return;
            }
            self.auth.clear();
        }

        if self.surface_errors {
            self.notifier.error(err.user_message(&self.base_url));
        }
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        return Err(ApiError::from_response(
            status.as_u16(),
            status.canonical_reason(),
            &String::from_utf8_lossy(&bytes),
        ));
    }
    decode_body(&bytes)
}

/// Empty bodies decode as JSON `null`, so `()` and `Option<_>` work for 204s.
fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"null").map_err(ApiError::from);
    }
    serde_json::from_slice(bytes).map_err(ApiError::from)
}
