//! Authenticated HTTP client for the platform services.
//!
//! Every request carries the session's bearer token. A `401` answer clears the
//! session and is reported as [`ApiError::SessionExpired`] so callers never have
//! to handle it themselves.

use crate::api::endpoints::{Endpoints, Service};
use crate::error::ApiError;
use crate::models::{LoginRequest, LoginResponse};
use crate::session::SessionStore;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// REST client shared by every command.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Build a client with the given per-request timeout.
    pub fn new(
        endpoints: Endpoints,
        session: Arc<SessionStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoints,
            session,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// GET a JSON document from a service.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoints.url(service, path);
        debug!(url = %url, "GET request");

        let response = self.send(self.http.get(&url), fallback).await?;
        decode(response).await
    }

    /// POST an optional JSON body and decode the JSON answer.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        body: Option<&Value>,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoints.url(service, path);
        debug!(url = %url, "POST request");

        let mut request = self.http.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.send(request, fallback).await?;
        decode(response).await
    }

    /// GET a binary resource; the caller consumes the body.
    pub async fn get_stream(
        &self,
        service: Service,
        path: &str,
        fallback: &str,
    ) -> Result<Response, ApiError> {
        let url = self.endpoints.url(service, path);
        debug!(url = %url, "GET (binary) request");

        self.send(self.http.get(&url), fallback).await
    }

    /// Fetch the free-form statistics object of a service.
    pub async fn statistics(&self, service: Service) -> Result<Value, ApiError> {
        let path = service.statistics_path().ok_or_else(|| {
            ApiError::Decode(format!("service {} has no statistics endpoint", service))
        })?;
        self.get_json(service, path, "Failed to fetch statistics").await
    }

    /// Query the health endpoint of a service.
    pub async fn health(&self, service: Service) -> Result<Value, ApiError> {
        let url = self.endpoints.health_url(service);
        debug!(url = %url, "Health check");

        let response = self.send(self.http.get(&url), "Health check failed").await?;
        decode(response).await
    }

    /// Exchange credentials for a token. Persisting it is up to the caller.
    ///
    /// A rejected login is reported with the server's `detail` and does not
    /// touch the current session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.endpoints.url(Service::Auth, "/auth/login");
        debug!(url = %url, username, "Login request");

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, "Invalid username or password").await);
        }

        decode(response).await
    }

    async fn send(&self, request: RequestBuilder, fallback: &str) -> Result<Response, ApiError> {
        let request = match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Service rejected the session token; clearing session");
            self.session.expire();
            return Err(ApiError::SessionExpired);
        }

        if !response.status().is_success() {
            return Err(status_error(response, fallback).await);
        }

        Ok(response)
    }
}

/// Turn a non-success response into [`ApiError::Status`], preferring the
/// server's `detail` message over the fallback.
async fn status_error(response: Response, fallback: &str) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    ApiError::Status {
        status,
        message: detail_message(&body).unwrap_or_else(|| fallback.to_string()),
    }
}

/// Extract a string `detail` field from an error body.
pub fn detail_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("detail")?.as_str().map(str::to_string)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}
