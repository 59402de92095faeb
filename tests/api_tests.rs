//! End-to-end tests driving the full router over the in-memory backend

use std::{path::PathBuf, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use libris_server::{
    api,
    config::{AppConfig, DatabaseBackend},
    repository::Repository,
    services::clock::SystemClock,
    AppState,
};

struct TestApp {
    router: Router,
    uploads_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads_dir);
    }
}

impl TestApp {
    async fn new() -> Self {
        let uploads_dir =
            std::env::temp_dir().join(format!("libris-api-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&uploads_dir).unwrap();

        let mut config = AppConfig::default();
        config.database.backend = DatabaseBackend::Memory;
        config.storage.public_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public");
        config.storage.uploads_dir = uploads_dir.clone();

        let state = AppState::new(config, Repository::in_memory(), Arc::new(SystemClock));
        Self {
            router: api::router(state),
            uploads_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn delete_raw(&self, uri: &str, token: &str, id: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(id.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Sign up and log in, returning the bearer token
    async fn login_as(&self, email: &str, role: &str) -> String {
        let (status, _) = self
            .json(
                Method::POST,
                "/api/signup",
                None,
                Some(json!({"name": "Tester", "email": email, "password": "secret", "role": role})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .json(
                Method::POST,
                "/api/login",
                None,
                Some(json!({"email": email, "password": "secret"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_book(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/books",
                Some(token),
                Some(json!({"title": title, "author": "Frank Herbert"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_member(&self, token: &str, email: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/members",
                Some(token),
                Some(json!({"name": "Alice", "email": email})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let (status, body) = app.json(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.json(Method::GET, "/api/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new().await;

    let (status, body) = app.json(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], false);
    assert!(body["msg"].is_string());
}

#[tokio::test]
async fn test_options_is_empty_204_with_cors() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/books")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_signup_login_me_logout() {
    let app = TestApp::new().await;
    let token = app.login_as("alice@example.com", "member").await;
    assert_eq!(token.len(), 64);

    let (status, body) = app.json(Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["role"], "member");
    assert!(body.get("password_hash").is_none());

    let (status, _) = app.json(Method::POST, "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.json(Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_signup_and_bad_login() {
    let app = TestApp::new().await;
    app.login_as("bob@example.com", "member").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/signup",
            None,
            Some(json!({"name": "Bob", "email": "bob@example.com", "password": "other"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/login",
            None,
            Some(json!({"email": "bob@example.com", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_mutations_require_token() {
    let app = TestApp::new().await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/books",
            None,
            Some(json!({"title": "Dune", "author": "Herbert"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/borrow",
            Some("not-a-real-token"),
            Some(json!({"bookId": "x", "memberId": "y"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.json(Method::GET, "/api/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_book_crud() {
    let app = TestApp::new().await;
    let admin = app.login_as("admin@example.com", "admin").await;

    let (status, body) = app
        .json(Method::POST, "/api/books", Some(&admin), Some(json!({"title": "Dune"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MissingField");

    let id = app.create_book(&admin, "Dune").await;

    let (status, body) = app
        .json(
            Method::PUT,
            "/api/books",
            Some(&admin),
            Some(json!({"id": id, "genre": "Science Fiction", "year": 1965})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["genre"], "Science Fiction");
    assert_eq!(body["book"]["title"], "Dune");

    let (_, books) = app.json(Method::GET, "/api/books", None, None).await;
    assert_eq!(books[0]["year"], 1965);
    assert_eq!(books[0]["status"], "Available");
    assert_eq!(books[0]["borrowCount"], 0);
    assert_eq!(books[0]["cover"], "/images/placeholder-cover.svg");

    let (status, _) = app
        .json(
            Method::PUT,
            "/api/books",
            Some(&admin),
            Some(json!({"id": uuid::Uuid::new_v4().to_string(), "title": "Other"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete_raw("/api/books", &admin, &id).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete_raw("/api/books", &admin, &id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_requires_admin() {
    let app = TestApp::new().await;
    let member = app.login_as("m@example.com", "member").await;
    let id = app.create_book(&member, "Dune").await;

    let (status, body) = app.delete_raw("/api/books", &member, &id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_anonymous_admin_signup_cannot_delete() {
    let app = TestApp::new().await;
    let admin = app.login_as("root@example.com", "admin").await;
    let id = app.create_book(&admin, "Dune").await;

    let intruder = app.login_as("intruder@example.com", "admin").await;
    let (status, body) = app
        .json(Method::GET, "/api/me", Some(&intruder), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "member");

    let (status, _) = app.delete_raw("/api/books", &intruder, &id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // an admin token may grant the role
    let (status, _) = app
        .json(
            Method::POST,
            "/api/signup",
            Some(&admin),
            Some(json!({"name": "Deputy", "email": "deputy@example.com", "password": "secret", "role": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = app
        .json(
            Method::POST,
            "/api/login",
            None,
            Some(json!({"email": "deputy@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(body["user"]["role"], "admin");
    let deputy = body["token"].as_str().unwrap().to_string();

    let (status, _) = app.delete_raw("/api/books", &deputy, &id).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_loan_length_uses_default() {
    let app = TestApp::new().await;
    let token = app.login_as("desk@example.com", "member").await;
    let book = app.create_book(&token, "Dune").await;
    let member = app.create_member(&token, "alice@example.com").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/borrow",
            Some(&token),
            Some(json!({"bookId": book, "memberId": member, "days": 100_000_000_000i64})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, loans) = app.json(Method::GET, "/api/loans?open=true", None, None).await;
    assert_eq!(loans[0]["dueDate"], body["dueDate"]);
    let borrowed_on = chrono::DateTime::parse_from_rfc3339(loans[0]["borrowedOn"].as_str().unwrap()).unwrap();
    let due = chrono::DateTime::parse_from_rfc3339(body["dueDate"].as_str().unwrap()).unwrap();
    assert_eq!(due - borrowed_on, chrono::Duration::days(7));
}

#[tokio::test]
async fn test_member_email_is_unique() {
    let app = TestApp::new().await;
    let token = app.login_as("staff@example.com", "admin").await;
    app.create_member(&token, "alice@example.com").await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/members",
            Some(&token),
            Some(json!({"name": "Other", "email": "alice@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, members) = app.json(Method::GET, "/api/members", None, None).await;
    assert_eq!(members.as_array().unwrap().len(), 1);
    assert_eq!(members[0]["role"], "student");
}

#[tokio::test]
async fn test_borrow_return_and_reports() {
    let app = TestApp::new().await;
    let token = app.login_as("desk@example.com", "admin").await;
    let book = app.create_book(&token, "Dune").await;
    let other = app.create_book(&token, "Emma").await;
    let member = app.create_member(&token, "alice@example.com").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/borrow",
            Some(&token),
            Some(json!({"bookId": book, "memberId": member, "days": "abc"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["dueDate"].is_string());

    let (status, _) = app
        .json(
            Method::POST,
            "/api/borrow",
            Some(&token),
            Some(json!({"bookId": book, "memberId": member})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/borrow",
            Some(&token),
            Some(json!({"bookId": other, "memberId": uuid::Uuid::new_v4().to_string()})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, members) = app.json(Method::GET, "/api/members", None, None).await;
    assert_eq!(members[0]["borrowedBooks"][0]["bookId"], book.as_str());

    let (_, open) = app.json(Method::GET, "/api/loans?open=true", None, None).await;
    assert_eq!(open.as_array().unwrap().len(), 1);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/return",
            Some(&token),
            Some(json!({"bookId": book, "memberId": member})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fine"], 0.0);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/return",
            Some(&token),
            Some(json!({"bookId": book, "memberId": member})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, top) = app.json(Method::GET, "/api/reports/most-borrowed", None, None).await;
    assert_eq!(top[0]["id"], book.as_str());
    assert_eq!(top[0]["borrowCount"], 1);
    assert_eq!(top[0]["status"], "Available");

    let (_, active) = app
        .json(Method::GET, "/api/reports/active-members", None, None)
        .await;
    assert_eq!(active[0]["memberId"], member.as_str());
    assert_eq!(active[0]["borrowCount"], 1);
    assert_eq!(active[0]["member"]["email"], "alice@example.com");

    let (status, overdue) = app.json(Method::GET, "/api/reports/overdue", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue, json!([]));
}

#[tokio::test]
async fn test_upload_cover_is_served() {
    let app = TestApp::new().await;
    let token = app.login_as("up@example.com", "member").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/uploadCover",
            Some(&token),
            Some(json!({"filename": "front.weird", "base64": "data:image/png;base64,aGVsbG8="})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let path = body["path"].as_str().unwrap().to_string();
    assert!(path.starts_with("/uploads/"));
    assert!(path.ends_with(".weird"));

    let request = Request::builder().uri(&path).body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let (status, _) = app
        .json(
            Method::POST,
            "/api/uploadCover",
            Some(&token),
            Some(json!({"filename": "a.png", "base64": "%%%"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_static_index_is_served() {
    let app = TestApp::new().await;
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}
