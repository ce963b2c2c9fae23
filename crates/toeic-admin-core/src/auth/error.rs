use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Stored session is corrupt: {0}")]
    StorageCorrupt(String),

    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session has no access token")]
    InvalidSession,

    #[error("No active session")]
    NoSession,

    #[error("Authentication rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }
}
