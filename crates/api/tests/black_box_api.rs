use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use filmgate_api::app::{build_app, services::AppServices};
use filmgate_api::config::Settings;
use filmgate_auth::hash_password;
use filmgate_core::UserId;
use filmgate_infra::{IdentityStore as _, NewUser, TokenRegistry as _};

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build the same router as prod, on in-memory stores, bound to an
        // ephemeral port.
        let settings = Settings {
            access_token_secret_key: "test-access-secret".to_string(),
            refresh_token_secret_key: "test-refresh-secret".to_string(),
            access_token_lifetime_hours: 1,
            refresh_token_lifetime_hours: 24 * 7,
            redis_url: String::new(),
            database_url: String::new(),
            bind_addr: String::new(),
        };
        let services = Arc::new(AppServices::in_memory(&settings));
        let app = build_app(services.clone()).expect("router construction failed");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    async fn seed_user(&self, email: &str, password: &str, roles: &[&str]) -> UserId {
        let user = self
            .services
            .identities
            .create_user(NewUser {
                email: email.to_string(),
                password_hash: hash_password(password).unwrap(),
                full_name: None,
            })
            .await
            .unwrap();

        for name in roles {
            let existing = self
                .services
                .identities
                .list_roles()
                .await
                .unwrap()
                .into_iter()
                .find(|r| r.name == *name);
            let role = match existing {
                Some(role) => role,
                None => self.services.identities.create_role(name).await.unwrap(),
            };
            self.services
                .identities
                .grant_role(user.id, role.id)
                .await
                .unwrap();
        }

        user.id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> (String, String) {
    let res = client
        .post(format!("{}/auth/login/", base_url))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn login_returns_a_pair_and_wrong_password_returns_401() {
    let srv = TestServer::spawn().await;
    let user_id = srv.seed_user("alice@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let (access, refresh) = login(&client, &srv.base_url, "alice@example.com", "letmein12").await;
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert_ne!(access, refresh);

    // Wrong password: 401, no tokens, and the tracked pair is untouched.
    let tracked_before = srv
        .services
        .registry
        .current_refresh(user_id)
        .await
        .unwrap();
    let res = client
        .post(format!("{}/auth/login/", srv.base_url))
        .json(&json!({ "email": "alice@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let tracked_after = srv
        .services
        .registry
        .current_refresh(user_id)
        .await
        .unwrap();
    assert_eq!(tracked_before, tracked_after);
}

#[tokio::test]
async fn login_with_unknown_email_returns_404() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/login/", srv.base_url))
        .json(&json!({ "email": "ghost@example.com", "password": "whatever" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_malformed_headers() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .header("Authorization", "Bearer")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body["message"].as_str().unwrap(),
        "Authorization header is wrong. It must be like \"Bearer <token>\"."
    );

    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .header("Authorization", "Bearer not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_conflicts_on_duplicate_email_and_validates_payload() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/signup/", srv.base_url))
        .json(&json!({ "email": "new@example.com", "password": "letmein12", "full_name": "New User" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["email"].as_str().unwrap(), "new@example.com");

    let res = client
        .post(format!("{}/auth/signup/", srv.base_url))
        .json(&json!({ "email": "new@example.com", "password": "other-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(format!("{}/auth/signup/", srv.base_url))
        .json(&json!({ "email": "not-an-email", "password": "letmein12" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn role_mutations_require_superuser_and_conflict_on_duplicates() {
    let srv = TestServer::spawn().await;
    srv.seed_user("user@example.com", "letmein12", &["user"]).await;
    srv.seed_user("root@example.com", "letmein12", &["superuser"])
        .await;
    let client = reqwest::Client::new();

    // Listing roles is public (GET bypasses the gate).
    let res = client
        .get(format!("{}/auth/roles/", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // A plain user may not create roles.
    let (user_access, _) = login(&client, &srv.base_url, "user@example.com", "letmein12").await;
    let res = client
        .post(format!("{}/auth/roles/", srv.base_url))
        .bearer_auth(&user_access)
        .json(&json!({ "name": "editor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // The superuser may; the same name twice conflicts.
    let (root_access, _) = login(&client, &srv.base_url, "root@example.com", "letmein12").await;
    let res = client
        .post(format!("{}/auth/roles/", srv.base_url))
        .bearer_auth(&root_access)
        .json(&json!({ "name": "editor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/auth/roles/", srv.base_url))
        .bearer_auth(&root_access)
        .json(&json!({ "name": "editor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn logout_revokes_the_pair_and_blocks_refresh() {
    let srv = TestServer::spawn().await;
    srv.seed_user("bob@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let (access, refresh) = login(&client, &srv.base_url, "bob@example.com", "letmein12").await;

    // The refresh token works before logout.
    let res = client
        .post(format!("{}/auth/refresh-token/", srv.base_url))
        .bearer_auth(&refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body["detail"].as_str().unwrap(),
        "Access and refresh tokens has been revoked"
    );

    // Both tokens are now rejected, including the refresh token that was
    // never presented during logout.
    let res = client
        .post(format!("{}/auth/refresh-token/", srv.base_url))
        .bearer_auth(&refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_reissues_access_and_does_not_rotate_refresh() {
    let srv = TestServer::spawn().await;
    srv.seed_user("carol@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let (access_old, refresh) =
        login(&client, &srv.base_url, "carol@example.com", "letmein12").await;

    let res = client
        .post(format!("{}/auth/refresh-token/", srv.base_url))
        .bearer_auth(&refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let access_new = body["access_token"].as_str().unwrap().to_string();
    assert_ne!(access_new, access_old);
    assert!(body.get("refresh_token").is_none());

    // No rotation: the original refresh token is still accepted.
    let res = client
        .post(format!("{}/auth/refresh-token/", srv.base_url))
        .bearer_auth(&refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_an_access_token_and_vice_versa() {
    let srv = TestServer::spawn().await;
    srv.seed_user("dan@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let (access, refresh) = login(&client, &srv.base_url, "dan@example.com", "letmein12").await;

    let res = client
        .post(format!("{}/auth/refresh-token/", srv.base_url))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .bearer_auth(&refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn superseded_refresh_token_is_no_longer_current() {
    let srv = TestServer::spawn().await;
    srv.seed_user("erin@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let (_, refresh_old) = login(&client, &srv.base_url, "erin@example.com", "letmein12").await;
    let (_, refresh_new) = login(&client, &srv.base_url, "erin@example.com", "letmein12").await;

    // Still cryptographically valid, but not the current one.
    let res = client
        .post(format!("{}/auth/refresh-token/", srv.base_url))
        .bearer_auth(&refresh_old)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/auth/refresh-token/", srv.base_url))
        .bearer_auth(&refresh_new)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn black_list_endpoint_reports_revocation() {
    let srv = TestServer::spawn().await;
    srv.seed_user("frank@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let (access, _) = login(&client, &srv.base_url, "frank@example.com", "letmein12").await;

    let url = format!("{}/auth/tokens/is-in-black-list/", srv.base_url);
    let res = client
        .get(&url)
        .query(&[("access_token", access.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["is_compromised"], json!(false));

    client
        .post(format!("{}/auth/logout/", srv.base_url))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();

    let res = client
        .get(&url)
        .query(&[("access_token", access.as_str())])
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["is_compromised"], json!(true));

    // Undecodable input is a bad request, not a silent "false".
    let res = client
        .get(&url)
        .query(&[("access_token", "garbage")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn granting_a_role_invalidates_existing_sessions() {
    let srv = TestServer::spawn().await;
    let user_id = srv.seed_user("gina@example.com", "letmein12", &[]).await;
    srv.seed_user("root@example.com", "letmein12", &["superuser"])
        .await;
    let client = reqwest::Client::new();

    let (user_access, _) = login(&client, &srv.base_url, "gina@example.com", "letmein12").await;
    let (root_access, _) = login(&client, &srv.base_url, "root@example.com", "letmein12").await;

    let role: serde_json::Value = client
        .post(format!("{}/auth/roles/", srv.base_url))
        .bearer_auth(&root_access)
        .json(&json!({ "name": "subscriber" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let res = client
        .post(format!("{}/auth/roles/provide/", srv.base_url))
        .bearer_auth(&root_access)
        .json(&json!({ "user_id": user_id.to_string(), "role_id": role["id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["detail"].as_str().unwrap(), "Role successfully provided");

    // The old session carries a stale role snapshot, so it has been revoked.
    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .bearer_auth(&user_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Logging in again yields the new snapshot.
    let res = client
        .get(format!("{}/auth/users/{}/", srv.base_url, user_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_roles"], json!(["subscriber"]));
}

#[tokio::test]
async fn providing_a_role_to_a_missing_user_or_role_is_404() {
    let srv = TestServer::spawn().await;
    srv.seed_user("root@example.com", "letmein12", &["superuser"])
        .await;
    let client = reqwest::Client::new();

    let (root_access, _) = login(&client, &srv.base_url, "root@example.com", "letmein12").await;

    let res = client
        .post(format!("{}/auth/roles/provide/", srv.base_url))
        .bearer_auth(&root_access)
        .json(&json!({
            "user_id": uuid::Uuid::now_v7().to_string(),
            "role_id": uuid::Uuid::now_v7().to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_history_records_classified_devices() {
    let srv = TestServer::spawn().await;
    srv.seed_user("henry@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let phone_ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) Mobile/15E148";
    let res = client
        .post(format!("{}/auth/login/", srv.base_url))
        .header("User-Agent", phone_ua)
        .json(&json!({ "email": "henry@example.com", "password": "letmein12" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let desktop_ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
    let res = client
        .post(format!("{}/auth/login/", srv.base_url))
        .header("User-Agent", desktop_ua)
        .json(&json!({ "email": "henry@example.com", "password": "letmein12" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let access = body["access_token"].as_str().unwrap();

    let res = client
        .get(format!("{}/auth/login-history/", srv.base_url))
        .bearer_auth(access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();

    assert_eq!(body["total"], json!(2));
    let items = body["items"].as_array().unwrap();
    assert_eq!(items[0]["device_type"], json!("desktop"));
    assert_eq!(items[0]["user_agent"], json!(desktop_ua));
    assert_eq!(items[1]["device_type"], json!("mobile"));
    assert_eq!(body["prev_num"], json!(null));
    assert_eq!(body["next_num"], json!(null));
}

#[tokio::test]
async fn change_password_takes_effect_on_next_login() {
    let srv = TestServer::spawn().await;
    srv.seed_user("iris@example.com", "old-password", &[]).await;
    let client = reqwest::Client::new();

    let (access, _) = login(&client, &srv.base_url, "iris@example.com", "old-password").await;

    let res = client
        .post(format!("{}/auth/users/change-password/", srv.base_url))
        .bearer_auth(&access)
        .json(&json!({ "new_password": "new-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body["detail"].as_str().unwrap(),
        "Password was changed successfully!"
    );

    let res = client
        .post(format!("{}/auth/login/", srv.base_url))
        .json(&json!({ "email": "iris@example.com", "password": "old-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    login(&client, &srv.base_url, "iris@example.com", "new-password").await;
}

#[tokio::test]
async fn user_reads_are_public_and_mutations_are_gated() {
    let srv = TestServer::spawn().await;
    let user_id = srv.seed_user("judy@example.com", "letmein12", &[]).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/auth/users/", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/auth/users/{}/", srv.base_url, user_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Unauthenticated mutation is rejected.
    let res = client
        .delete(format!("{}/auth/users/{}/", srv.base_url, user_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (access, _) = login(&client, &srv.base_url, "judy@example.com", "letmein12").await;
    let res = client
        .delete(format!("{}/auth/users/{}/", srv.base_url, user_id))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The identity is gone: the still-decodable token now resolves nobody.
    let res = client
        .post(format!("{}/auth/logout/", srv.base_url))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
