//! End-to-end flows against a mock API server: login and role gating,
//! transparent refresh, forced logout on irrecoverable refresh, and
//! coalescing of concurrent refresh attempts.

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use portero::{
    ApiClient, ApiConfig, AuthService, GuardDecision, LoginRequest, Role, SessionManager,
    SessionState, TokenStore,
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

fn signed_token(role: &str, exp: i64) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = Base64UrlUnpadded::encode_string(
        json!({"sub": "user-1", "role": role, "exp": exp})
            .to_string()
            .as_bytes(),
    );
    format!("{header}.{payload}.signature")
}

fn auth_body(token: &str, refresh: &str) -> Value {
    json!({
        "token": token,
        "refreshToken": refresh,
        "expiresIn": 900,
        "user": {"userId": "user-1", "role": "TENANT", "email": "ada@example.test"}
    })
}

fn service_for(server: &MockServer) -> Result<AuthService> {
    let config = ApiConfig::new(&server.uri())?;
    let client = ApiClient::new(config, TokenStore::in_memory())?;
    Ok(AuthService::new(client))
}

#[tokio::test]
async fn tenant_login_populates_session_and_gates_routes() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let auth = service_for(&server)?;
    let session = SessionManager::new(auth);
    let token = signed_token("TENANT", now_unix() + 600);

    Mock::given(method("POST"))
        .and(path("/auth/tenant/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(&token, "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;

    let profile = session
        .login(
            Role::Tenant,
            &LoginRequest {
                user_identifier: "ada@example.test".to_string(),
                password: "hunter2".to_string(),
            },
        )
        .await?;

    assert_eq!(profile.role, Role::Tenant);
    assert!(session.auth().is_authenticated());
    assert_eq!(session.auth().current_role(), Some(Role::Tenant));

    // /tenant/dashboard is open, /admin/dashboard bounces back to the
    // caller's own dashboard.
    assert_eq!(session.guard(&[Role::Tenant]), GuardDecision::Allow);
    assert_eq!(
        session.guard(&[Role::Admin]),
        GuardDecision::Redirect("/tenant/dashboard".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn expired_access_with_valid_refresh_is_transparent() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let auth = service_for(&server)?;
    auth.client()
        .tokens()
        .set_pair(&signed_token("TENANT", now_unix() - 600), "refresh-old");
    let fresh = signed_token("TENANT", now_unix() + 600);

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "refresh-old"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(&fresh, "refresh-new")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("Authorization", format!("Bearer {fresh}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "role": "TENANT"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    // The caller observes no error.
    let profile = auth.current_user().await?;
    assert_eq!(profile.user_id, "user-1");
    assert_eq!(
        auth.client().tokens().access().as_deref(),
        Some(fresh.as_str())
    );
    assert_eq!(
        auth.client()
            .tokens()
            .refresh_token()
            .map(|t| t.expose_secret().to_string())
            .as_deref(),
        Some("refresh-new")
    );
    Ok(())
}

#[tokio::test]
async fn irrecoverable_refresh_forces_logout() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let auth = service_for(&server)?;
    auth.client()
        .tokens()
        .set_pair(&signed_token("TENANT", now_unix() - 600), "refresh-bad");
    let session = SessionManager::new(auth);
    let mut states = session.subscribe();

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = session.auth().current_user().await;
    assert!(result.is_err());

    // Token store ends empty and the session observes the invalidation.
    assert_eq!(session.auth().client().tokens().access(), None);
    assert!(session.auth().client().tokens().refresh_token().is_none());

    tokio::time::timeout(Duration::from_secs(2), states.changed()).await??;
    assert_eq!(*states.borrow(), SessionState::Unauthenticated);
    assert_eq!(
        session.guard(&[Role::Tenant]),
        GuardDecision::RedirectToLogin
    );
    Ok(())
}

#[tokio::test]
async fn second_401_after_replay_does_not_loop() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let auth = service_for(&server)?;
    auth.client()
        .tokens()
        .set_pair(&signed_token("TENANT", now_unix() - 600), "refresh-old");
    let fresh = signed_token("TENANT", now_unix() + 600);

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(&fresh, "refresh-new")))
        .expect(1)
        .mount(&server)
        .await;
    // The server keeps rejecting: original attempt plus exactly one replay.
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let result = auth.current_user().await;
    let err = result.err().ok_or_else(|| anyhow!("expected error"))?;
    assert_eq!(err.status(), Some(401));
    Ok(())
}

#[tokio::test]
async fn concurrent_401s_coalesce_into_one_refresh() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let auth = service_for(&server)?;
    auth.client()
        .tokens()
        .set_pair(&signed_token("TENANT", now_unix() - 600), "refresh-old");
    let fresh = signed_token("TENANT", now_unix() + 600);

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(auth_body(&fresh, "refresh-new"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .and(header("Authorization", format!("Bearer {fresh}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = auth.client().clone();
    let other = auth.client().clone();
    let (first, second) = tokio::join!(
        client.get::<Vec<Value>>("/bookings"),
        other.get::<Vec<Value>>("/bookings"),
    );
    first?;
    second?;

    // The refresh mock's expect(1) is verified when the server drops.
    Ok(())
}

#[tokio::test]
async fn hydrate_without_tokens_needs_no_network() -> Result<()> {
    // Closed port: any network call would fail the hydration into a
    // non-deterministic state rather than the direct transition under test.
    let config = ApiConfig::new("http://127.0.0.1:1")?;
    let client = ApiClient::new(config, TokenStore::in_memory())?;
    let session = SessionManager::new(AuthService::new(client));

    assert_eq!(session.state(), SessionState::Loading);
    assert_eq!(session.guard(&[Role::Admin]), GuardDecision::Wait);

    session.hydrate().await;
    assert_eq!(session.state(), SessionState::Unauthenticated);
    Ok(())
}

#[tokio::test]
async fn hydrate_with_valid_token_authenticates() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let auth = service_for(&server)?;
    auth.client()
        .tokens()
        .set_pair(&signed_token("OWNER", now_unix() + 600), "refresh-1");
    let session = SessionManager::new(auth);

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "role": "OWNER"
        })))
        .expect(1)
        .mount(&server)
        .await;

    session.hydrate().await;
    assert_eq!(session.state().role(), Some(Role::Owner));
    assert_eq!(session.guard(&[Role::Owner]), GuardDecision::Allow);
    Ok(())
}

#[tokio::test]
async fn logout_moves_session_to_unauthenticated() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let auth = service_for(&server)?;
    auth.client()
        .tokens()
        .set_pair(&signed_token("STAFF", now_unix() + 600), "refresh-1");
    let session = SessionManager::new(auth);

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    session.logout().await;
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(session.auth().client().tokens().access(), None);
    Ok(())
}
