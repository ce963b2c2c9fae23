//! Raw calls to the backend's `/auth` endpoints.
//!
//! These requests do not go through `ApiClient::send`: login, register and
//! refresh must never trigger the unauthorized-recovery path, and the rest
//! attach whatever session the caller hands in.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::{AuthError, Session, TokenRefresher};
use crate::models::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, PasswordResetRequest, RefreshResponse,
    RegisterRequest, TokenRenewal, UserStatus,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const STATUS_PATH: &str = "/auth/me";
const RESET_REQUEST_PATH: &str = "/auth/password/reset-request";
const VALIDATE_RESET_TOKEN_PATH: &str = "/auth/password/validate-token";
const RESET_PASSWORD_PATH: &str = "/auth/password/reset";

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthApi {
    client: Client,
    base_url: String,
}

impl AuthApi {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authenticate and return the session the backend issued.
    pub async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError> {
        debug!(username = %request.username, "Sending login request");
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let session: Session = Self::parse(response).await?;
        if !session.is_valid() {
            return Err(ApiError::InvalidResponse(
                "login response carried no access token".to_string(),
            ));
        }
        Ok(session)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageResponse, ApiError> {
        self.post_json(REGISTER_PATH, request, None).await
    }

    /// Tell the backend to expire its session cookie.
    pub async fn logout(&self, session: Option<&Session>) -> Result<(), ApiError> {
        let response = self
            .authorized(self.client.post(self.url(LOGOUT_PATH)), session)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Ask the backend who it thinks we are.
    pub async fn status(&self, session: Option<&Session>) -> Result<UserStatus, ApiError> {
        let request = self
            .client
            .get(self.url(STATUS_PATH))
            .query(&[("_", chrono::Utc::now().timestamp_millis())])
            .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(header::PRAGMA, "no-cache")
            .header(header::EXPIRES, "0");
        let response = self.authorized(request, session).send().await?;
        Self::parse(response).await
    }

    pub async fn request_password_reset(&self, request: &ForgotPasswordRequest) -> Result<MessageResponse, ApiError> {
        self.post_json(RESET_REQUEST_PATH, request, None).await
    }

    pub async fn validate_reset_token(&self, token: &str) -> Result<MessageResponse, ApiError> {
        let response = self
            .client
            .get(self.url(VALIDATE_RESET_TOKEN_PATH))
            .query(&[("token", token)])
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn reset_password(&self, request: &PasswordResetRequest) -> Result<MessageResponse, ApiError> {
        self.post_json(RESET_PASSWORD_PATH, request, None).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder, session: Option<&Session>) -> reqwest::RequestBuilder {
        match session {
            Some(session) => request.header(header::AUTHORIZATION, session.authorization_value()),
            None => request,
        }
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        session: Option<&Session>,
    ) -> Result<T, ApiError> {
        let request = self.client.post(self.url(path)).json(body);
        let response = self.authorized(request, session).send().await?;
        Self::parse(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TokenRefresher for AuthApi {
    async fn refresh(&self, session: &Session) -> Result<TokenRenewal, AuthError> {
        // The refresh cookie rides along from the client's cookie store.
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .header(header::AUTHORIZATION, session.authorization_value())
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Refresh exchange rejected");
            return Err(AuthError::Rejected(format!("refresh returned {}", status)));
        }

        let text = response.text().await?;
        let parsed: RefreshResponse = serde_json::from_str(&text)
            .map_err(|e| AuthError::Rejected(format!("unreadable refresh response: {}", e)))?;
        let message = parsed.message.clone();
        parsed.into_renewal().ok_or_else(|| {
            AuthError::Rejected(format!(
                "refresh response carried no access token ({})",
                message.as_deref().unwrap_or("no message")
            ))
        })
    }
}
