//! REST API client module for the TOEIC backend.
//!
//! This module provides the `ApiClient` for authenticated calls to protected
//! endpoints and `AuthApi` for the `/auth` endpoints themselves.
//!
//! The backend uses JWT bearer tokens issued at login and renewed through a
//! cookie-backed refresh endpoint.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::AuthApi;
pub use client::ApiClient;
pub use error::ApiError;
