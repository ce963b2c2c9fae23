//! Core library for toeic-admin.
//!
//! Holds the admin console's session lifecycle (`auth`), the authenticated
//! REST client (`api`), wire payloads (`models`) and configuration (`config`).

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{AuthError, AuthService, Session, SessionManager};
pub use config::Config;
