//! Credentialed calls to the resource service.
//!
//! The session credential travels in the shared cookie jar of the transport;
//! this module never reads it. It only refuses to send anything while the
//! client identity is anonymous.

use super::{config::ClientConfig, errors::ApiError, identity::ClientIdentity};
use crate::server::SESSION_COOKIE_NAME;
use crate::APP_USER_AGENT;
use reqwest::{cookie::Jar, Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

/// Maximum number of error body characters kept in [`ApiError::Http`].
const MAX_ERROR_CHARS: usize = 200;

/// Build a cookie jar holding the session credential for every origin in `urls`.
#[must_use]
pub fn session_jar<'a>(token: &SecretString, urls: impl IntoIterator<Item = &'a Url>) -> Arc<Jar> {
    let jar = Jar::default();
    let cookie = format!("{SESSION_COOKIE_NAME}={}; Path=/", token.expose_secret());
    for url in urls {
        jar.add_cookie_str(&cookie, url);
    }
    Arc::new(jar)
}

#[derive(Clone, Debug)]
pub struct ResourceClient {
    http: Client,
    base_url: String,
    identity: Arc<ClientIdentity>,
}

impl ResourceClient {
    /// # Errors
    /// Returns [`ApiError::Config`] if the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        identity: Arc<ClientIdentity>,
        jar: Arc<Jar>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .cookie_provider(jar)
            .timeout(config.timeout())
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: config.api_base_url().to_string(),
            identity,
        })
    }

    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Pre-flight gate. Synchronous, no network I/O.
    ///
    /// # Errors
    /// Returns [`ApiError::Unauthenticated`] when the client identity is anonymous.
    pub fn authorized_request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        if !self.identity.is_authenticated() {
            debug!(path, "request blocked before sending: not authenticated");
            return Err(ApiError::Unauthenticated);
        }
        let url = super::config::build_url_with_base(&self.base_url, path);
        Ok(self.http.request(method, url))
    }

    /// Fetch JSON from the resource service.
    ///
    /// # Errors
    /// See [`ApiError`].
    #[instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.authorized_request(Method::GET, path)?;
        let response = send(request).await?;
        handle_json_response(response).await
    }

    /// Post an empty body and expect no content back.
    ///
    /// # Errors
    /// See [`ApiError`].
    #[instrument(skip(self))]
    pub async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let request = self.authorized_request(Method::POST, path)?;
        let response = send(request).await?;
        handle_empty_response(response).await
    }

    /// Like [`Self::get_json`], but resolves to [`ApiError::Cancelled`] as soon
    /// as `cancel` fires.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn get_json_cancellable<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ApiError::Cancelled),
            result = self.get_json(path) => result,
        }
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn post_empty_cancellable(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ApiError::Cancelled),
            result = self.post_empty(path) => result,
        }
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    request.send().await.map_err(map_request_error)
}

fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out. Please try again.".to_string())
    } else if err.is_builder() {
        ApiError::Serialization(format!("Failed to build request: {err}"))
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(http_error(response).await)
    }
}

async fn handle_empty_response(response: Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(http_error(response).await)
    }
}

async fn http_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::Http {
        status,
        message: sanitize_body(&body),
    }
}

fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
