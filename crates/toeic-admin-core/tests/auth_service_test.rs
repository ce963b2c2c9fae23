//! Login, status and persistence flows against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, ServerGuard};

use toeic_admin_core::api::{ApiClient, ApiError, AuthApi};
use toeic_admin_core::auth::{
    AuthError, AuthService, FileSessionStore, MemorySessionStore, SessionManager, SessionStore,
};
use toeic_admin_core::models::RegisterRequest;

const LOGIN_BODY: &str = r#"{
    "id": 7,
    "username": "admin",
    "email": "admin@toeic.vn",
    "fullName": "Quan Tri",
    "roles": ["ROLE_ADMIN"],
    "accessToken": "jwt-1",
    "tokenType": "Bearer"
}"#;

async fn service(store: Arc<dyn SessionStore>) -> (ServerGuard, AuthService) {
    let server = mockito::Server::new_async().await;
    let base = format!("{}/api", server.url());
    let http = ApiClient::http_client(Duration::from_secs(5)).unwrap();
    let api = AuthApi::new(http, base);
    let sessions = Arc::new(SessionManager::new(store, Arc::new(api.clone())));
    (server, AuthService::new(api, sessions))
}

#[tokio::test]
async fn test_login_installs_and_persists_session() {
    let store = Arc::new(MemorySessionStore::new());
    let (mut server, auth) = service(store.clone()).await;

    let login = server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(LOGIN_BODY)
        .expect(1)
        .create_async()
        .await;

    let session = auth.login(" admin ", "admin123").await.unwrap();
    login.assert_async().await;

    assert_eq!(session.user_id, 7);
    assert!(auth.sessions().has_admin_capability().await);
    assert_eq!(
        auth.sessions().authorization_header().await.as_deref(),
        Some("Bearer jwt-1")
    );

    let record = store.load().unwrap().unwrap();
    assert!(record.contains(r#""userId":7"#));
    assert!(record.contains(r#""accessToken":"jwt-1""#));
}

#[tokio::test]
async fn test_login_rejects_blank_credentials_without_request() {
    let (mut server, auth) = service(Arc::new(MemorySessionStore::new())).await;
    let login = server
        .mock("POST", "/api/auth/login")
        .expect(0)
        .create_async()
        .await;

    let err = auth.login("admin", "   ").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Auth(AuthError::Validation { field: "password", .. })
    ));
    login.assert_async().await;
    assert!(!auth.sessions().is_authenticated().await);
}

#[tokio::test]
async fn test_bad_credentials_leave_no_session() {
    let (mut server, auth) = service(Arc::new(MemorySessionStore::new())).await;
    let _login = server
        .mock("POST", "/api/auth/login")
        .with_status(401)
        .with_body(r#"{"message": "Bad credentials"}"#)
        .create_async()
        .await;

    assert!(matches!(
        auth.login("admin", "wrong").await,
        Err(ApiError::Unauthorized)
    ));
    assert!(!auth.sessions().is_authenticated().await);
}

#[tokio::test]
async fn test_check_auth_status_updates_role() {
    let store = Arc::new(MemorySessionStore::new());
    let (mut server, auth) = service(store.clone()).await;
    let _login = server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_body(LOGIN_BODY)
        .create_async()
        .await;
    auth.login("admin", "admin123").await.unwrap();

    let status = server
        .mock("GET", "/api/auth/me")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer jwt-1")
        .match_header("cache-control", "no-cache, no-store, must-revalidate")
        .with_status(200)
        .with_body(r#"{"username": "admin", "authenticated": true, "role": "ROLE_ADMIN"}"#)
        .expect(1)
        .create_async()
        .await;

    assert!(auth.check_auth_status().await);
    status.assert_async().await;

    let session = auth.sessions().active_session().await.unwrap();
    assert_eq!(session.role.as_deref(), Some("ROLE_ADMIN"));
    assert!(session.last_refreshed_at.is_some());
}

#[tokio::test]
async fn test_check_auth_status_logs_out_when_backend_disowns_session() {
    let store = Arc::new(MemorySessionStore::with_record(
        r#"{"userId": 7, "username": "admin", "accessToken": "jwt-1"}"#,
    ));
    let (mut server, auth) = service(store.clone()).await;
    assert!(auth.sessions().initialize().await);

    let _status = server
        .mock("GET", "/api/auth/me")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"authenticated": false}"#)
        .create_async()
        .await;

    assert!(!auth.check_auth_status().await);
    assert!(!auth.sessions().is_authenticated().await);
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_check_auth_status_keeps_session_on_server_error() {
    let store = Arc::new(MemorySessionStore::with_record(
        r#"{"userId": 7, "username": "admin", "accessToken": "jwt-1"}"#,
    ));
    let (mut server, auth) = service(store.clone()).await;
    auth.sessions().initialize().await;

    let _status = server
        .mock("GET", "/api/auth/me")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    assert!(!auth.check_auth_status().await);
    assert!(auth.sessions().is_authenticated().await);
    assert!(store.load().unwrap().is_some());
}

#[tokio::test]
async fn test_logout_clears_local_session_even_if_backend_fails() {
    let store = Arc::new(MemorySessionStore::with_record(
        r#"{"userId": 7, "username": "admin", "accessToken": "jwt-1"}"#,
    ));
    let (mut server, auth) = service(store.clone()).await;
    auth.sessions().initialize().await;

    let logout = server
        .mock("POST", "/api/auth/logout")
        .match_header("authorization", "Bearer jwt-1")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    auth.logout().await.unwrap();
    logout.assert_async().await;
    assert!(!auth.sessions().is_authenticated().await);
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_register_surfaces_backend_message() {
    let (mut server, auth) = service(Arc::new(MemorySessionStore::new())).await;
    let _register = server
        .mock("POST", "/api/auth/register")
        .match_body(Matcher::PartialJson(serde_json::json!({"fullName": "Tran Hung"})))
        .with_status(400)
        .with_body(r#"{"message": "Username is already taken!", "success": false}"#)
        .create_async()
        .await;

    let request = RegisterRequest {
        username: "hung".to_string(),
        email: "hung@toeic.vn".to_string(),
        full_name: "Tran Hung".to_string(),
        password: "123456".to_string(),
    };
    let err = auth.register(&request).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Username is already taken!"));
    assert!(!auth.sessions().is_authenticated().await);
}

#[tokio::test]
async fn test_reset_token_validation() {
    let (mut server, auth) = service(Arc::new(MemorySessionStore::new())).await;
    let _valid = server
        .mock("GET", "/api/auth/password/validate-token")
        .match_query(Matcher::UrlEncoded("token".into(), "good".into()))
        .with_status(200)
        .with_body(r#"{"message": "Token hop le", "success": true}"#)
        .create_async()
        .await;
    let _expired = server
        .mock("GET", "/api/auth/password/validate-token")
        .match_query(Matcher::UrlEncoded("token".into(), "stale".into()))
        .with_status(400)
        .with_body(r#"{"message": "Token da het han", "success": false}"#)
        .create_async()
        .await;

    assert!(auth.validate_reset_token("good").await.unwrap());
    assert!(!auth.validate_reset_token("stale").await.unwrap());
}

#[tokio::test]
async fn test_forgot_password_validates_email_first() {
    let (mut server, auth) = service(Arc::new(MemorySessionStore::new())).await;
    let reset = server
        .mock("POST", "/api/auth/password/reset-request")
        .expect(0)
        .create_async()
        .await;

    assert!(auth.forgot_password("not-an-email").await.is_err());
    reset.assert_async().await;
}

#[tokio::test]
async fn test_session_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();

    {
        let (mut server, auth) = service(Arc::new(FileSessionStore::new(dir.path()))).await;
        let _login = server
            .mock("POST", "/api/auth/login")
            .with_status(200)
            .with_body(LOGIN_BODY)
            .create_async()
            .await;
        auth.login("admin", "admin123").await.unwrap();
    }

    let (_server, restarted) = service(Arc::new(FileSessionStore::new(dir.path()))).await;
    assert!(restarted.sessions().initialize().await);
    let session = restarted.sessions().active_session().await.unwrap();
    assert_eq!(session.user_id, 7);
    assert_eq!(session.access_token, "jwt-1");
    assert!(restarted.sessions().has_admin_capability().await);
}

#[tokio::test]
async fn test_corrupt_file_record_starts_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("user.json"), "{not json").unwrap();

    let (_server, auth) = service(Arc::new(FileSessionStore::new(dir.path()))).await;
    assert!(!auth.sessions().initialize().await);
    assert!(!auth.sessions().is_authenticated().await);
}
