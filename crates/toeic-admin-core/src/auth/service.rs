//! Login, registration, logout and password-reset flows.
//!
//! `AuthService` pairs the raw `/auth` calls with the `SessionManager` so a
//! successful login installs the session and a logout clears it on both ends.

use std::sync::Arc;

use tracing::{info, warn};

use super::{Session, SessionManager};
use crate::api::{ApiError, AuthApi};
use crate::models::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, PasswordResetRequest, RegisterRequest,
};

#[derive(Clone)]
pub struct AuthService {
    api: AuthApi,
    sessions: Arc<SessionManager>,
}

impl AuthService {
    pub fn new(api: AuthApi, sessions: Arc<SessionManager>) -> Self {
        Self { api, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Authenticate and install the issued session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let request = LoginRequest::new(username.trim(), password);
        request.validate()?;

        let session = self.api.login(&request).await?;
        self.sessions.set_session(session.clone()).await?;
        info!(user_id = session.user_id, admin = session.has_admin_capability(), "Login successful");
        Ok(session)
    }

    /// Create an account. Registration does not log the new user in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageResponse, ApiError> {
        request.validate()?;
        let response = self.api.register(request).await?;
        if !response.success {
            return Err(ApiError::BadRequest(response.message));
        }
        info!(username = %request.username, "Account registered");
        Ok(response)
    }

    /// End the session on the backend (best effort) and locally.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Some(session) = self.sessions.active_session().await {
            if let Err(e) = self.api.logout(Some(&session)).await {
                warn!(error = %e, "Backend logout failed, clearing local session anyway");
            }
        }
        self.sessions.logout().await?;
        Ok(())
    }

    /// Confirm the session with the backend.
    ///
    /// An authenticated answer refreshes the stored username and role. A
    /// negative answer, or a 401/403, logs out. Other failures leave the
    /// session alone and report `false`.
    pub async fn check_auth_status(&self) -> bool {
        let current = self.sessions.active_session().await;
        match self.api.status(current.as_ref()).await {
            Ok(status) if status.authenticated => {
                if let Err(e) = self.sessions.apply_status(&status).await {
                    warn!(error = %e, "Failed to record session status");
                }
                true
            }
            Ok(_) => {
                info!("Backend reports no authenticated user");
                self.clear_local().await;
                false
            }
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "Session rejected by backend");
                self.clear_local().await;
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to check session status");
                false
            }
        }
    }

    async fn clear_local(&self) {
        if let Err(e) = self.sessions.logout().await {
            warn!(error = %e, "Failed to clear session storage");
        }
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let request = ForgotPasswordRequest::new(email.trim());
        request.validate()?;
        self.api.request_password_reset(&request).await
    }

    /// Whether a password-reset token is still usable.
    pub async fn validate_reset_token(&self, token: &str) -> Result<bool, ApiError> {
        match self.api.validate_reset_token(token).await {
            Ok(response) => Ok(response.success),
            Err(ApiError::BadRequest(message)) => {
                info!(%message, "Reset token rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<MessageResponse, ApiError> {
        let request = PasswordResetRequest {
            token: token.trim().to_string(),
            new_password: new_password.to_string(),
        };
        request.validate()?;
        self.api.reset_password(&request).await
    }
}
