//! Wire payloads for the TOEIC backend's authentication endpoints.
//!
//! - `LoginRequest`, `RegisterRequest`: credentials sent to `/auth`
//! - `PasswordResetRequest`, `ForgotPasswordRequest`: reset flow
//! - `UserStatus`, `MessageResponse`, `TokenRenewal`: responses

pub mod auth;

pub(crate) use auth::RefreshResponse;
pub use auth::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, PasswordResetRequest, RegisterRequest,
    TokenRenewal, UserStatus,
};
