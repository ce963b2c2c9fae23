//! Durable storage for the serialized session record.
//!
//! Every store holds at most one record under [`SESSION_KEY`]. Stores deal in
//! raw JSON strings; parsing and validation belong to the `SessionManager`, so
//! a corrupt record is detected in one place regardless of backend.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use tracing::debug;

use super::AuthError;

/// Fixed key the session record lives under.
pub const SESSION_KEY: &str = "user";

/// Keychain service name for [`KeyringSessionStore`].
pub const KEYRING_SERVICE: &str = "toeic-admin";

pub trait SessionStore: Send + Sync {
    /// Read the stored record, `None` if nothing is stored.
    fn load(&self) -> Result<Option<String>, AuthError>;

    /// Replace the stored record.
    fn save(&self, record: &str) -> Result<(), AuthError>;

    /// Delete the stored record. Removing a missing record succeeds.
    fn remove(&self) -> Result<(), AuthError>;
}

/// Session record kept as `<dir>/user.json`.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", SESSION_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<String>, AuthError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &str) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written record.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, record)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Session record written");
        Ok(())
    }

    fn remove(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Session record kept in the OS keychain.
pub struct KeyringSessionStore {
    service: String,
}

impl KeyringSessionStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, AuthError> {
        Ok(Entry::new(&self.service, SESSION_KEY)?)
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<String>, AuthError> {
        match self.entry()?.get_password() {
            Ok(record) => Ok(Some(record)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &str) -> Result<(), AuthError> {
        self.entry()?.set_password(record)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), AuthError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a record, as if written by an earlier run.
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(record.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>, AuthError> {
        Ok(self.record.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, record: &str) -> Result<(), AuthError> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), AuthError> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested"));

        assert!(store.load().unwrap().is_none());
        store.remove().unwrap();

        store.save(r#"{"userId":1}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"userId":1}"#));
        assert!(store.path().ends_with("user.json"));
        assert!(!store.path().with_extension("json.tmp").exists());

        store.save(r#"{"userId":2}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"userId":2}"#));

        store.remove().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemorySessionStore::with_record("seed");
        assert_eq!(store.load().unwrap().as_deref(), Some("seed"));

        store.save("next").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("next"));

        store.remove().unwrap();
        store.remove().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
