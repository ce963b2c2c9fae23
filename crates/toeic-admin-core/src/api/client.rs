//! Authenticated client for the TOEIC backend's REST API.
//!
//! Every request goes through [`ApiClient::send`], which attaches the current
//! credential at send time, retries rate-limited requests with backoff, and
//! on a 401 asks the `SessionManager` to recover before re-issuing the request
//! exactly once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, Request, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::auth::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use super::ApiError;
use crate::auth::{Recovery, SessionManager};

// ============================================================================
// Constants
// ============================================================================

/// User agent sent with every request.
const USER_AGENT: &str = concat!("toeic-admin/", env!("CARGO_PKG_VERSION"));

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Endpoints whose 401 means bad credentials, not an expired session.
const NO_RECOVERY_PATHS: [&str; 3] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

/// Clone is cheap - the reqwest client and the session manager are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    sessions: Arc<SessionManager>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Build the shared HTTP client.
    /// The cookie store keeps the backend's refresh cookie between calls.
    pub fn http_client(timeout: Duration) -> Result<Client, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(client)
    }

    pub fn new(client: Client, base_url: impl Into<String>, sessions: Arc<SessionManager>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sessions,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Override the first rate-limit backoff delay.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/exams/3`.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| ApiError::InvalidResponse(format!("Bad URL {}: {}", joined, e)))
    }

    /// Start a request; finish it with [`ApiClient::send`].
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        Ok(self
            .client
            .request(method, self.url(path)?)
            .header(header::ACCEPT, "application/json"))
    }

    /// Attach the current credential to a request.
    ///
    /// Reads the session at call time, so a request built before a refresh
    /// goes out with the renewed token. Returns the token it attached so a
    /// later 401 can be matched against it.
    pub async fn authorize(&self, mut request: Request) -> Result<(Request, Option<String>), ApiError> {
        let session = self.sessions.active_session().await;
        let headers = request.headers_mut();
        match session {
            Some(ref session) => {
                let value = header::HeaderValue::from_str(&session.authorization_value())?;
                headers.insert(header::AUTHORIZATION, value);
            }
            None => {
                headers.remove(header::AUTHORIZATION);
            }
        }
        Ok((request, session.map(|s| s.access_token)))
    }

    fn recovery_allowed(url: &Url) -> bool {
        !NO_RECOVERY_PATHS.iter().any(|p| url.path().ends_with(p))
    }

    /// Send a request with credential, rate-limit and unauthorized handling.
    ///
    /// A 401 is recovered at most once per request. If recovery ends in a
    /// logout, or the re-issued request is rejected again, the caller gets
    /// `ApiError::Unauthorized`.
    pub async fn send(&self, request: Request) -> Result<Response, ApiError> {
        let recoverable = Self::recovery_allowed(request.url());
        let mut pending = request;
        let mut recovery_attempted = false;
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            // Bodies built from bytes/json are always clonable.
            let replay = pending.try_clone();
            let (authorized, sent_token) = self.authorize(pending).await?;
            let method = authorized.method().clone();
            let url = authorized.url().to_string();

            debug!(%method, url = %url, "Sending request");
            let response = self
                .client
                .execute(authorized)
                .await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            match (status, replay) {
                (StatusCode::UNAUTHORIZED, Some(replay)) if recoverable && !recovery_attempted => {
                    recovery_attempted = true;
                    match self.sessions.recover_unauthorized(sent_token.as_deref()).await {
                        Recovery::Retry => {
                            info!(url = %url, "Re-issuing request with renewed credential");
                            pending = replay;
                        }
                        Recovery::LoggedOut => return Err(ApiError::Unauthorized),
                    }
                }
                (StatusCode::TOO_MANY_REQUESTS, Some(replay)) => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                    pending = replay;
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ApiError::from_status(status, &body));
                }
            }
        }
    }

    async fn json_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().to_string();
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path)?.build()?;
        let response = self.send(request).await?;
        Self::json_response(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let request = self.request(Method::POST, path)?.json(body).build()?;
        let response = self.send(request).await?;
        Self::json_response(response).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let request = self.request(Method::PUT, path)?.json(body).build()?;
        let response = self.send(request).await?;
        Self::json_response(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, path)?.build()?;
        self.send(request).await?;
        Ok(())
    }
}
