use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Credential scheme used when the backend does not name one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Role markers that grant administrative capability.
/// The backend has issued both the Spring-prefixed and bare forms over time.
pub const ADMIN_ROLES: [&str; 2] = ["ROLE_ADMIN", "ADMIN"];

/// The authenticated identity and credential held for the current user.
///
/// This is also the persisted record format, so field names follow the
/// backend's camelCase JSON. The login response names the identifier `id`;
/// stored records use `userId`. Both are accepted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(alias = "id")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Missing or null reads as empty, which `is_valid` rejects.
    #[serde(default, deserialize_with = "string_or_empty")]
    pub access_token: String,
    #[serde(default = "default_token_type", deserialize_with = "token_type_or_default")]
    pub token_type: String,
    /// Last successful renewal or status check. Advisory only.
    #[serde(
        rename = "lastChecked",
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    #[cfg_attr(feature = "ts", ts(type = "number | null"))]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// The backend serializes absent profile fields as `null`.
fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn token_type_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(default_token_type))
}

impl Session {
    /// A session is usable only while it carries a credential.
    pub fn is_valid(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// True if either the `roles` list or the `role` scalar names an admin role.
    pub fn has_admin_capability(&self) -> bool {
        let in_list = self
            .roles
            .as_ref()
            .map(|roles| roles.iter().any(|r| is_admin_role(r)))
            .unwrap_or(false);
        let as_scalar = self.role.as_deref().map(is_admin_role).unwrap_or(false);
        in_list || as_scalar
    }

    /// Value for the `Authorization` header: `<tokenType> <accessToken>`.
    pub fn authorization_value(&self) -> String {
        let scheme = if self.token_type.trim().is_empty() {
            DEFAULT_TOKEN_TYPE
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", scheme, self.access_token)
    }

    /// Install a renewed credential.
    /// An absent or blank token type keeps the current scheme.
    pub fn renew(&mut self, access_token: String, token_type: Option<String>) {
        self.access_token = access_token;
        if let Some(token_type) = token_type.filter(|t| !t.trim().is_empty()) {
            self.token_type = token_type;
        } else if self.token_type.trim().is_empty() {
            self.token_type = default_token_type();
        }
        self.mark_checked();
    }

    /// Stamp `last_refreshed_at` with the current time.
    /// Truncated to milliseconds, the resolution of the stored record.
    pub fn mark_checked(&mut self) {
        self.last_refreshed_at = Some(Utc::now().trunc_subsecs(3));
    }

    /// Display name, falling back to the username.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

fn is_admin_role(role: &str) -> bool {
    ADMIN_ROLES.contains(&role)
}

// Manual impl so the credential never ends up in logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("roles", &self.roles)
            .field("access_token", &"REDACTED")
            .field("token_type", &self.token_type)
            .field("last_refreshed_at", &self.last_refreshed_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Option<&str>, roles: Option<&[&str]>) -> Session {
        Session {
            user_id: 1,
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            full_name: "Admin User".to_string(),
            role: role.map(str::to_string),
            roles: roles.map(|r| r.iter().map(|s| s.to_string()).collect()),
            access_token: "T1".to_string(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            last_refreshed_at: None,
        }
    }

    #[test]
    fn test_admin_capability() {
        assert!(session(None, Some(&["ROLE_ADMIN"])).has_admin_capability());
        assert!(session(None, Some(&["ROLE_USER", "ADMIN"])).has_admin_capability());
        assert!(session(Some("ROLE_ADMIN"), None).has_admin_capability());
        assert!(session(Some("ADMIN"), Some(&["ROLE_USER"])).has_admin_capability());

        assert!(!session(None, None).has_admin_capability());
        assert!(!session(Some("ROLE_USER"), Some(&["ROLE_USER"])).has_admin_capability());
        assert!(!session(Some("admin"), Some(&["role_admin", "ROLE_ADMINISTRATOR"])).has_admin_capability());
        assert!(!session(None, Some(&[])).has_admin_capability());
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"id": 7, "username": "admin", "email": "admin@toeic.vn", "fullName": "Quan Tri", "roles": ["ROLE_ADMIN"], "accessToken": "abc.def.ghi", "tokenType": "Bearer"}"#;

        let parsed: Session = serde_json::from_str(json).expect("Failed to parse login response");
        assert_eq!(parsed.user_id, 7);
        assert_eq!(parsed.full_name, "Quan Tri");
        assert_eq!(parsed.roles.as_deref(), Some(&["ROLE_ADMIN".to_string()][..]));
        assert!(parsed.role.is_none());
        assert!(parsed.is_valid());
        assert_eq!(parsed.authorization_value(), "Bearer abc.def.ghi");
    }

    #[test]
    fn test_token_type_defaults() {
        let missing: Session =
            serde_json::from_str(r#"{"userId": 1, "accessToken": "T"}"#).unwrap();
        assert_eq!(missing.token_type, "Bearer");

        let null: Session =
            serde_json::from_str(r#"{"userId": 1, "accessToken": "T", "tokenType": null}"#).unwrap();
        assert_eq!(null.token_type, "Bearer");

        let blank: Session =
            serde_json::from_str(r#"{"userId": 1, "accessToken": "T", "tokenType": " "}"#).unwrap();
        assert_eq!(blank.token_type, "Bearer");
    }

    #[test]
    fn test_stored_record_field_names() {
        let mut s = session(Some("ROLE_USER"), None);
        s.last_refreshed_at = DateTime::from_timestamp_millis(1_700_000_000_123);

        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["userId"], 1);
        assert_eq!(value["fullName"], "Admin User");
        assert_eq!(value["accessToken"], "T1");
        assert_eq!(value["tokenType"], "Bearer");
        assert_eq!(value["lastChecked"], 1_700_000_000_123_i64);
        assert_eq!(value["role"], "ROLE_USER");
        assert!(value.get("roles").is_none());

        let back: Session = serde_json::from_value(value).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_null_profile_fields_read_as_empty() {
        let json = r#"{"id": 4, "username": "hung", "email": null, "fullName": null, "role": null, "roles": null, "accessToken": "T1", "tokenType": "Bearer"}"#;
        let parsed: Session = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.email, "");
        assert_eq!(parsed.full_name, "");
        assert_eq!(parsed.display_name(), "hung");
        assert!(parsed.is_valid());

        let no_token: Session = serde_json::from_str(r#"{"userId": 4, "accessToken": null}"#).unwrap();
        assert!(!no_token.is_valid());
    }

    #[test]
    fn test_renew_keeps_scheme_when_absent() {
        let mut s = session(None, None);
        s.token_type = "JWT".to_string();

        s.renew("T2".to_string(), None);
        assert_eq!(s.access_token, "T2");
        assert_eq!(s.token_type, "JWT");
        assert!(s.last_refreshed_at.is_some());

        s.renew("T3".to_string(), Some("Bearer".to_string()));
        assert_eq!(s.authorization_value(), "Bearer T3");
    }

    #[test]
    fn test_debug_redacts_token() {
        let s = session(None, None);
        let printed = format!("{:?}", s);
        assert!(!printed.contains("T1"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn test_empty_token_is_invalid() {
        let mut s = session(None, None);
        s.access_token = "   ".to_string();
        assert!(!s.is_valid());
    }
}
