//! Router-level tests against the in-memory user store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use user_api::{
    app::build_app,
    auth::password::hash_password,
    state::AppState,
    users::{
        memory::MemoryUserStore,
        repo::UserStore,
        repo_types::{Role, User},
    },
};
use uuid::Uuid;

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<MemoryUserStore>,
}

impl TestApp {
    fn new() -> Self {
        let (state, store) = AppState::fake();
        Self {
            router: build_app(state.clone()),
            state,
            store,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json_body) => builder
                .body(Body::from(serde_json::to_string(&json_body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    /// Inserts a user directly; the hash is real only when `password` is given.
    async fn seed(&self, name: &str, email: &str, password: Option<&str>, role: Role) -> User {
        let password_hash = match password {
            Some(p) => hash_password(p).unwrap(),
            None => "$argon2id$unused".into(),
        };
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash,
            role,
            registration_date: OffsetDateTime::now_utc(),
        };
        self.store.insert(user.clone()).await.unwrap();
        user
    }

    fn token_for(&self, user: &User) -> String {
        self.state.keys.sign(user.id).unwrap()
    }

    async fn admin(&self) -> (User, String) {
        let admin = self.seed("Admin", "admin@example.com", None, Role::Admin).await;
        let token = self.token_for(&admin);
        (admin, token)
    }
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn register_returns_public_projection() {
    let app = TestApp::new();

    let (status, json) = app
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "name": "Ann", "email": "ann@example.com", "password": "secret1" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "User registered successfully");
    let data = json["data"].as_object().unwrap();
    assert!(data["id"].is_string());
    assert_eq!(data["name"], "Ann");
    assert_eq!(data["email"], "ann@example.com");
    assert!(data["registrationDate"].is_string());
    assert!(!data.contains_key("password"));
    assert!(!data.contains_key("passwordHash"));
    assert!(!data.contains_key("role"));

    let stored = app.store.find_by_email("ann@example.com").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::User);
    assert_ne!(stored.password_hash, "secret1");
}

#[tokio::test]
async fn register_twice_with_same_email_conflicts() {
    let app = TestApp::new();
    let body = json!({ "name": "Ann", "email": "ann@example.com", "password": "secret1" });

    let (first, _) = app.send("POST", "/api/register", None, Some(body)).await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, json) = app
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "name": "Other", "email": "ANN@example.com", "password": "secret2" })),
        )
        .await;
    assert_eq!(second, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({ "error": "Email already in use" }));
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn register_reports_field_errors() {
    let app = TestApp::new();

    let (status, json) = app
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "name": "", "email": "nope", "password": "123" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Validation failed");
    for field in ["name", "email", "password"] {
        assert!(json["fields"][field].is_array(), "missing {field}");
    }
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn register_rejects_missing_fields() {
    let app = TestApp::new();

    let (status, json) = app
        .send("POST", "/api/register", None, Some(json!({ "email": "ann@example.com" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["fields"]["body"].is_array());
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn login_token_carries_user_id() {
    let app = TestApp::new();
    let user = app.seed("Ann", "ann@example.com", Some("secret1"), Role::User).await;

    let (status, json) = app
        .send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "secret1" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let token = json["token"].as_str().unwrap();
    let claims = app.state.keys.verify(token).unwrap();
    assert_eq!(claims.id, user.id);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.seed("Ann", "ann@example.com", Some("secret1"), Role::User).await;

    let wrong_password = app
        .send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "wrong-one" })),
        )
        .await;
    let unknown_email = app
        .send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "bob@example.com", "password": "secret1" })),
        )
        .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password.1, json!({ "error": "Invalid email or password" }));
}

#[tokio::test]
async fn login_validates_email_syntax() {
    let app = TestApp::new();

    let (status, json) = app
        .send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "x" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["fields"]["email"].is_array());
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn profile_requires_token() {
    let app = TestApp::new();

    let (status, json) = app.send("GET", "/api/profile", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, json!({ "error": "Authentication required" }));
}

#[tokio::test]
async fn profile_returns_own_record() {
    let app = TestApp::new();
    let user = app.seed("Ann", "ann@example.com", None, Role::User).await;
    let token = app.token_for(&user);

    let (status, json) = app.send("GET", "/api/profile", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_object().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data["name"], "Ann");
    assert_eq!(data["email"], "ann@example.com");
    assert!(data["registrationDate"].is_string());
}

#[tokio::test]
async fn token_of_deleted_user_is_invalid() {
    let app = TestApp::new();
    let user = app.seed("Ann", "ann@example.com", None, Role::User).await;
    let token = app.token_for(&user);
    app.store.delete(user.id).await.unwrap();

    let (status, json) = app.send("GET", "/api/profile", Some(&token), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, json!({ "error": "Invalid token" }));
}

// =============================================================================
// Admin gate
// =============================================================================

#[tokio::test]
async fn admin_routes_reject_missing_expired_and_non_admin_tokens() {
    let app = TestApp::new();
    let (admin, _) = app.admin().await;
    let user = app.seed("Ann", "ann@example.com", None, Role::User).await;
    let user_token = app.token_for(&user);
    let expired = app
        .state
        .keys
        .sign_issued_at(admin.id, OffsetDateTime::now_utc() - Duration::days(2))
        .unwrap();

    let create_body = json!({ "name": "New", "email": "new@example.com", "password": "secret1" });
    let cases = [
        (None, StatusCode::UNAUTHORIZED),
        (Some(expired.as_str()), StatusCode::UNAUTHORIZED),
        (Some("garbage"), StatusCode::UNAUTHORIZED),
        (Some(user_token.as_str()), StatusCode::FORBIDDEN),
    ];

    for (token, expected) in cases {
        let (status, _) = app
            .send("POST", "/api/admin/users", token, Some(create_body.clone()))
            .await;
        assert_eq!(status, expected);

        let (status, _) = app.send("GET", "/api/admin/users", token, None).await;
        assert_eq!(status, expected);

        let (status, _) = app
            .send(
                "PUT",
                &format!("/api/admin/users/{}", user.id),
                token,
                Some(json!({ "name": "Changed" })),
            )
            .await;
        assert_eq!(status, expected);

        let (status, _) = app
            .send("DELETE", &format!("/api/admin/users/{}", user.id), token, None)
            .await;
        assert_eq!(status, expected);
    }

    // None of the rejected requests touched the store.
    assert_eq!(app.store.len().await, 2);
    let untouched = app.store.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(untouched.name, "Ann");
    assert!(app.store.find_by_email("new@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn forbidden_response_body() {
    let app = TestApp::new();
    let user = app.seed("Ann", "ann@example.com", None, Role::User).await;
    let token = app.token_for(&user);

    let (status, json) = app.send("GET", "/api/admin/users", Some(&token), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json, json!({ "error": "Admin access required" }));
}

// =============================================================================
// Admin CRUD
// =============================================================================

#[tokio::test]
async fn admin_creates_user_with_optional_role() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;

    let (status, json) = app
        .send(
            "POST",
            "/api/admin/users",
            Some(&token),
            Some(json!({ "name": "Boss", "email": "boss@example.com", "password": "secret1", "role": "ADMIN" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "User created successfully");
    assert_eq!(json["data"]["role"], "ADMIN");
    assert!(json["data"].get("passwordHash").is_none());

    let (status, json) = app
        .send(
            "POST",
            "/api/admin/users",
            Some(&token),
            Some(json!({ "name": "Plain", "email": "plain@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["role"], "USER");

    let (status, json) = app
        .send(
            "POST",
            "/api/admin/users",
            Some(&token),
            Some(json!({ "name": "Dup", "email": "plain@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Email already in use");
}

#[tokio::test]
async fn list_second_page_of_fifteen() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;
    for i in 0..15 {
        app.seed(&format!("User {i}"), &format!("user{i}@example.com"), None, Role::User)
            .await;
    }

    let (status, json) = app
        .send("GET", "/api/admin/users?page=2&role=USER", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["users"].as_array().unwrap().len(), 5);
    assert_eq!(data["page"], 2);
    assert_eq!(data["totalPages"], 2);
    assert_eq!(data["totalUsers"], 15);
    let first = data["users"][0].as_object().unwrap();
    for key in ["id", "name", "email", "role", "registrationDate"] {
        assert!(first.contains_key(key), "missing {key}");
    }
    assert!(!first.contains_key("passwordHash"));
}

#[tokio::test]
async fn list_filters_and_page_defaults() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;
    app.seed("Alice Smith", "alice@corp.io", None, Role::User).await;
    app.seed("Bob Jones", "bob@example.com", None, Role::User).await;

    let (status, json) = app
        .send("GET", "/api/admin/users?page=abc&name=SMITH", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["page"], 1);
    assert_eq!(json["data"]["totalUsers"], 1);
    assert_eq!(json["data"]["users"][0]["name"], "Alice Smith");

    let (_, json) = app
        .send("GET", "/api/admin/users?email=EXAMPLE.COM", Some(&token), None)
        .await;
    assert_eq!(json["data"]["totalUsers"], 2);

    let (_, json) = app
        .send("GET", "/api/admin/users?role=ADMIN", Some(&token), None)
        .await;
    assert_eq!(json["data"]["totalUsers"], 1);

    let (status, json) = app
        .send("GET", "/api/admin/users?role=ROOT", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["fields"]["role"].is_array());
}

#[tokio::test]
async fn list_rejects_repeated_query_key_as_json() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;

    let (status, json) = app
        .send("GET", "/api/admin/users?page=1&page=2", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Validation failed");
    assert_eq!(json["fields"]["query"][0], "malformed query string");
}

#[tokio::test]
async fn update_email_uniqueness() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;
    let ann = app.seed("Ann", "ann@example.com", None, Role::User).await;
    app.seed("Bob", "bob@example.com", None, Role::User).await;
    let uri = format!("/api/admin/users/{}", ann.id);

    let (status, json) = app
        .send("PUT", &uri, Some(&token), Some(json!({ "email": "bob@example.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Email already in use");

    let (status, json) = app
        .send(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "email": "ann@example.com", "name": "Ann B.", "role": "ADMIN" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User updated successfully");
    assert_eq!(json["data"]["name"], "Ann B.");
    assert_eq!(json["data"]["email"], "ann@example.com");
    assert_eq!(json["data"]["role"], "ADMIN");

    let stored = app.store.find_by_id(ann.id).await.unwrap().unwrap();
    assert_eq!(stored.registration_date, ann.registration_date);
}

#[tokio::test]
async fn update_unknown_user_is_not_found() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;

    let (status, json) = app
        .send(
            "PUT",
            &format!("/api/admin/users/{}", Uuid::new_v4()),
            Some(&token),
            Some(json!({ "name": "X" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({ "error": "User not found" }));

    let (status, _) = app
        .send("PUT", "/api/admin/users/42", Some(&token), Some(json!({ "name": "X" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_cannot_delete_self() {
    let app = TestApp::new();
    let (admin, token) = app.admin().await;

    let (status, json) = app
        .send("DELETE", &format!("/api/admin/users/{}", admin.id), Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({ "error": "Cannot delete yourself" }));
    assert!(app.store.find_by_id(admin.id).await.unwrap().is_some());
}

#[tokio::test]
async fn admin_deletes_other_user() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;
    let ann = app.seed("Ann", "ann@example.com", None, Role::User).await;
    let uri = format!("/api/admin/users/{}", ann.id);

    let (status, json) = app.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "message": "User deleted successfully" }));
    assert!(app.store.find_by_id(ann.id).await.unwrap().is_none());

    let (status, _) = app.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Misc
// =============================================================================

#[tokio::test]
async fn health_check() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}
