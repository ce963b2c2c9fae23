//! The single authority for who is logged in and with which credential.
//!
//! One `SessionManager` is built by the application's composition root and
//! shared as `Arc<SessionManager>` with everything that issues authenticated
//! requests. It persists every change through a [`SessionStore`] before making
//! it visible, and runs the refresh-once recovery when a request is rejected
//! as unauthorized.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::{AuthError, Session, SessionStore};
use crate::models::{TokenRenewal, UserStatus};

/// Unauthenticated entry point the user is sent to after a forced logout.
pub const LOGIN_ROUTE: &str = "/login";

/// Role assumed when the status endpoint does not report one.
const DEFAULT_ROLE: &str = "ROLE_USER";

/// The authentication backend's credential-refresh exchange.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, session: &Session) -> Result<TokenRenewal, AuthError>;
}

/// Where the user currently is, and how to send them to the login entry point.
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> Option<String>;
    fn redirect(&self, route: &str);
}

/// Navigator for headless use: nowhere to redirect to.
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_route(&self) -> Option<String> {
        None
    }

    fn redirect(&self, _route: &str) {}
}

/// Outcome of recovering from an unauthorized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// A renewed credential is active; re-issue the request once.
    Retry,
    /// The session is gone; fail the request.
    LoggedOut,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    refresher: Arc<dyn TokenRefresher>,
    navigator: Arc<dyn Navigator>,
    session: RwLock<Option<Session>>,
    // Held for the whole of a recovery so only one refresh is in flight.
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            navigator: Arc::new(NoopNavigator),
            session: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Load a previously persisted session.
    ///
    /// Returns whether a session was restored. Missing, unreadable or
    /// malformed records all leave the manager without a session; they are
    /// logged, never returned as errors.
    pub async fn initialize(&self) -> bool {
        let restored = match self.with_store(|store| store.load()).await {
            Ok(Some(record)) => match Self::parse_record(&record) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Ignoring stored session");
                    None
                }
            },
            Ok(None) => {
                debug!("No stored session");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read session storage");
                None
            }
        };

        if let Some(ref session) = restored {
            info!(user_id = session.user_id, username = %session.username, "Session restored");
        }

        let found = restored.is_some();
        *self.session.write().await = restored;
        found
    }

    fn parse_record(record: &str) -> Result<Session, AuthError> {
        let session: Session = serde_json::from_str(record)
            .map_err(|e| AuthError::StorageCorrupt(e.to_string()))?;
        if !session.is_valid() {
            return Err(AuthError::StorageCorrupt("record has no access token".to_string()));
        }
        Ok(session)
    }

    pub async fn active_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn has_admin_capability(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .map(Session::has_admin_capability)
            .unwrap_or(false)
    }

    /// `Authorization` header value for the session as it is right now.
    pub async fn authorization_header(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(Session::authorization_value)
    }

    /// Replace the active session. The record is persisted before the new
    /// session becomes visible; on a storage error nothing changes.
    pub async fn set_session(&self, session: Session) -> Result<(), AuthError> {
        if !session.is_valid() {
            return Err(AuthError::InvalidSession);
        }
        let mut guard = self.session.write().await;
        self.commit(&mut guard, session).await?;
        if let Some(ref s) = *guard {
            info!(user_id = s.user_id, username = %s.username, "Session installed");
        }
        Ok(())
    }

    /// Modify the active session in place and persist the result.
    /// Returns `false` when there is no session to update.
    pub async fn update<F>(&self, f: F) -> Result<bool, AuthError>
    where
        F: FnOnce(&mut Session),
    {
        let mut guard = self.session.write().await;
        let Some(mut updated) = guard.clone() else {
            return Ok(false);
        };
        f(&mut updated);
        if !updated.is_valid() {
            return Err(AuthError::InvalidSession);
        }
        self.commit(&mut guard, updated).await?;
        Ok(true)
    }

    /// Fold a `/auth/me` result into the active session.
    /// The role list is kept when present, otherwise seeded from the scalar.
    pub async fn apply_status(&self, status: &UserStatus) -> Result<bool, AuthError> {
        let role = status
            .role
            .clone()
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());
        self.update(|session| {
            if let Some(ref username) = status.username {
                session.username = username.clone();
            }
            if session.roles.is_none() {
                session.roles = Some(vec![role.clone()]);
            }
            session.role = Some(role);
            session.mark_checked();
        })
        .await
    }

    /// Persist `session`, then publish it through `guard`.
    ///
    /// The write lock stays held across the store write so readers never see
    /// a session that is not on disk yet, and concurrent commits land in
    /// order. The write itself runs on the blocking pool; keychain backends
    /// can take a while to answer.
    async fn commit(
        &self,
        guard: &mut RwLockWriteGuard<'_, Option<Session>>,
        session: Session,
    ) -> Result<(), AuthError> {
        let record = serde_json::to_string(&session)?;
        self.with_store(move |store| store.save(&record)).await?;
        **guard = Some(session);
        Ok(())
    }

    /// Run a synchronous store operation off the async worker threads.
    async fn with_store<T, F>(&self, op: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SessionStore) -> Result<T, AuthError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| AuthError::Io(std::io::Error::other(e)))?
    }

    /// Clear the session from memory and storage. Calling it with no session
    /// is a no-op. Memory is cleared even if the storage removal fails.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let previous = self.session.write().await.take();
        if let Some(session) = previous {
            info!(user_id = session.user_id, "Session cleared");
        }
        self.with_store(|store| store.remove()).await
    }

    /// Exchange the current credential for a renewed one.
    ///
    /// Returns `false` without contacting the backend when no session is
    /// active, and `false` without touching state when the exchange fails.
    /// Deciding whether to log out is up to the caller.
    pub async fn refresh_token(&self) -> bool {
        match self.try_refresh_token().await {
            Ok(()) => true,
            Err(AuthError::NoSession) => {
                debug!("Refresh skipped, no active session");
                false
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                false
            }
        }
    }

    pub async fn try_refresh_token(&self) -> Result<(), AuthError> {
        let current = self.active_session().await.ok_or(AuthError::NoSession)?;

        debug!(user_id = current.user_id, "Requesting token refresh");
        let renewal = self.refresher.refresh(&current).await?;
        if renewal.access_token.trim().is_empty() {
            return Err(AuthError::Rejected("empty access token".to_string()));
        }

        let mut guard = self.session.write().await;
        let mut renewed = match guard.as_ref() {
            Some(active) if active.user_id == current.user_id => active.clone(),
            Some(_) => {
                return Err(AuthError::Rejected(
                    "session changed during refresh".to_string(),
                ))
            }
            None => return Err(AuthError::NoSession),
        };
        renewed.renew(renewal.access_token, renewal.token_type);
        self.commit(&mut guard, renewed).await?;

        info!(user_id = current.user_id, "Access token refreshed");
        Ok(())
    }

    /// Recover from a request rejected as unauthorized.
    ///
    /// `sent_token` is the credential the rejected request carried. Callers
    /// queue on a single gate: the first one refreshes, later ones see the
    /// renewed (or cleared) session and skip the backend. A failed refresh
    /// logs out and redirects to [`LOGIN_ROUTE`].
    pub async fn recover_unauthorized(&self, sent_token: Option<&str>) -> Recovery {
        let _gate = self.refresh_gate.lock().await;

        match self.token().await {
            None => {
                // With a credential on the request, whoever cleared the
                // session already redirected.
                if sent_token.is_none() {
                    self.redirect_to_login();
                }
                debug!("Session already cleared");
                return Recovery::LoggedOut;
            }
            Some(current) if sent_token != Some(current.as_str()) => {
                debug!("Credential already renewed, retrying");
                return Recovery::Retry;
            }
            Some(_) => {}
        }

        if self.refresh_token().await {
            return Recovery::Retry;
        }

        // A login that landed while the exchange was in flight is not ours to
        // clear; retry with it instead.
        if let Some(current) = self.token().await {
            if sent_token != Some(current.as_str()) {
                info!("Session replaced during refresh, retrying with it");
                return Recovery::Retry;
            }
        }

        if let Err(e) = self.logout().await {
            warn!(error = %e, "Failed to clear session storage after rejected refresh");
        }
        self.redirect_to_login();
        Recovery::LoggedOut
    }

    fn redirect_to_login(&self) {
        let here = self.navigator.current_route();
        if here.as_deref().is_some_and(|route| route.contains(LOGIN_ROUTE)) {
            debug!("Already at login entry point");
            return;
        }
        info!(from = ?here, "Redirecting to login");
        self.navigator.redirect(LOGIN_ROUTE);
    }
}
