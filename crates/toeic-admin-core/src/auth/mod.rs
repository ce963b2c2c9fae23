//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Session`: the authenticated identity and bearer credential
//! - `SessionStore`: durable storage for the session record (file, keychain, memory)
//! - `SessionManager`: the process's single session authority, with refresh-once recovery
//! - `AuthService`: login, registration, logout and password-reset flows

pub mod error;
pub mod manager;
pub mod service;
pub mod session;
pub mod store;

pub use error::AuthError;
pub use manager::{Navigator, NoopNavigator, Recovery, SessionManager, TokenRefresher, LOGIN_ROUTE};
pub use service::AuthService;
pub use session::{Session, ADMIN_ROLES, DEFAULT_TOKEN_TYPE};
pub use store::{FileSessionStore, KeyringSessionStore, MemorySessionStore, SessionStore, SESSION_KEY};
