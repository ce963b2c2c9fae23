//! Request and response payloads of the `/auth` endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Username length bounds enforced by the backend.
const USERNAME_LENGTH: (usize, usize) = (3, 20);

/// Password length bounds enforced by the backend.
const PASSWORD_LENGTH: (usize, usize) = (6, 40);

const MAX_EMAIL_LENGTH: usize = 50;

const MAX_FULL_NAME_LENGTH: usize = 100;

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        require_non_blank("username", &self.username)?;
        require_non_blank("password", &self.password)
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[PROTECTED]")
            .finish()
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

impl RegisterRequest {
    /// Apply the backend's field constraints before sending.
    pub fn validate(&self) -> Result<(), AuthError> {
        require_length("username", &self.username, USERNAME_LENGTH.0, USERNAME_LENGTH.1)?;
        validate_email(&self.email)?;
        require_length("full name", &self.full_name, 1, MAX_FULL_NAME_LENGTH)?;
        validate_password(&self.password)
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password", &"[PROTECTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into() }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        validate_email(&self.email)
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub token: String,
    pub new_password: String,
}

impl PasswordResetRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_non_blank("token", &self.token)?;
        validate_password(&self.new_password)
    }
}

impl fmt::Debug for PasswordResetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetRequest")
            .field("token", &"[PROTECTED]")
            .field("new_password", &"[PROTECTED]")
            .finish()
    }
}

/// Generic `{message, success}` body used by most auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

/// Body of `GET /auth/me`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserStatus {
    pub username: Option<String>,
    #[serde(default)]
    pub authenticated: bool,
    pub role: Option<String>,
}

/// A renewed credential from the refresh exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRenewal {
    pub access_token: String,
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenRenewal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRenewal")
            .field("access_token", &"REDACTED")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Raw refresh response. The endpoint may answer 2xx with only a message,
/// which counts as a rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub message: Option<String>,
}

impl RefreshResponse {
    pub(crate) fn into_renewal(self) -> Option<TokenRenewal> {
        let token_type = self.token_type;
        self.access_token
            .filter(|t| !t.trim().is_empty())
            .map(|access_token| TokenRenewal {
                access_token,
                token_type,
            })
    }
}

fn require_non_blank(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn require_length(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), AuthError> {
    require_non_blank(field, value)?;
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AuthError::validation(
            field,
            format!("must be between {} and {} characters", min, max),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    require_length("password", password, PASSWORD_LENGTH.0, PASSWORD_LENGTH.1)
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    require_length("email", email, 3, MAX_EMAIL_LENGTH)?;
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(AuthError::validation("email", "is not a valid address"));
    }
    Ok(())
}
