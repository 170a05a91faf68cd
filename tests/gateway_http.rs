//! # End-to-end tests for the HTTP surface
//!
//! Drives the full router (dispatch, handlers, token service, file store)
//! in-process with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use tokengate::auth::{now_millis, Token, TOKENS_COLLECTION, USERS_COLLECTION};
use tokengate::config::AuthConfig;
use tokengate::store::{FileStore, ObjectStore};
use tokengate::{build_router, AppState};

const PHONE: &str = "5551234567";

struct TestApp {
    _tmp: TempDir,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FileStore::open(&tmp.path().join("data")).unwrap());
        let state = AppState::new(store, &AuthConfig::default());
        Self { _tmp: tmp, state }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
        let response = build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body, content_type)
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("token", token);
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let (status, body, _) = self.send(builder.body(body).unwrap()).await;
        (status, body)
    }

    async fn register_jane(&self) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/users",
            None,
            Some(json!({
                "firstName": "Jane",
                "lastName": "Doe",
                "phone": PHONE,
                "password": "secret",
                "tosAgreement": true
            })),
        )
        .await
    }

    async fn login_jane(&self) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/tokens",
                None,
                Some(json!({"phone": PHONE, "password": "secret"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

// -- Scenario A: registration is not idempotent ------------------------------

#[tokio::test]
async fn scenario_a_duplicate_registration_conflicts() {
    let app = TestApp::new();

    let (status, body) = app.register_jane().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, body) = app.register_jane().await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Error"], "User already registered");
}

// -- Scenario B: login then authorized read -----------------------------------

#[tokio::test]
async fn scenario_b_login_then_read_without_hash() {
    let app = TestApp::new();
    app.register_jane().await;

    let token = app.login_jane().await;
    assert_eq!(token["phone"], PHONE);
    assert!(token["expires"].as_i64().unwrap() > now_millis());
    let id = token["id"].as_str().unwrap().to_owned();

    let (status, user) = app
        .call("GET", &format!("/users?phone={PHONE}"), Some(&id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        user,
        json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "phone": PHONE,
            "tosAgreement": true
        })
    );
}

// -- Scenario C: reads need a token --------------------------------------------

#[tokio::test]
async fn scenario_c_read_without_token_is_forbidden() {
    let app = TestApp::new();
    app.register_jane().await;

    let (status, body) = app
        .call("GET", &format!("/users?phone={PHONE}"), None, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["Error"].is_string());
}

// -- Scenario D: expired tokens cannot be extended -----------------------------

#[tokio::test]
async fn scenario_d_extend_expired_token_is_rejected() {
    let app = TestApp::new();
    app.register_jane().await;

    let expired = Token {
        phone: PHONE.into(),
        id: "expiredtoken00000000".into(),
        expires: now_millis() - 1_000,
    };
    app.state
        .store
        .create(
            TOKENS_COLLECTION,
            &expired.id,
            &serde_json::to_value(&expired).unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = app
        .call(
            "PUT",
            "/tokens",
            None,
            Some(json!({"id": &expired.id, "extend": true})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["Error"].is_string());

    let stored = app.state.tokens.lookup(&expired.id).await.unwrap();
    assert_eq!(stored.expires, expired.expires);

    // an expired token also stops authorizing reads
    let (status, _) = app
        .call("GET", &format!("/users?phone={PHONE}"), Some(&expired.id), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// -- Full life-cycle -----------------------------------------------------------

#[tokio::test]
async fn user_and_token_life_cycle() {
    let app = TestApp::new();
    app.register_jane().await;
    let id = app.login_jane().await["id"].as_str().unwrap().to_owned();

    let (status, _) = app
        .call(
            "PUT",
            "/users",
            Some(&id),
            Some(json!({"phone": PHONE, "firstName": "Janet"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call("PUT", "/tokens", None, Some(json!({"id": &id, "extend": true})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, token) = app.call("GET", &format!("/tokens?id={id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(token["id"], id.as_str());

    let (status, user) = app
        .call("GET", &format!("/users?phone={PHONE}"), Some(&id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["firstName"], "Janet");

    let (status, _) = app
        .call("DELETE", "/users", Some(&id), Some(json!({"phone": PHONE})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app
        .state
        .store
        .read(USERS_COLLECTION, PHONE)
        .await
        .unwrap_err()
        .is_not_found());

    let (status, _) = app
        .call("DELETE", "/tokens", None, Some(json!({"id": &id})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("GET", &format!("/tokens?id={id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Dispatcher behaviour ------------------------------------------------------

#[tokio::test]
async fn unknown_path_is_not_found_with_json_body() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/nothing/here")
        .body(Body::empty())
        .unwrap();
    let (status, body, content_type) = app.send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_object());
    assert_eq!(content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn unsupported_method_on_known_resource_is_405() {
    let app = TestApp::new();
    let (status, _) = app.call("PATCH", "/users", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn trailing_slashes_route_to_the_same_resource() {
    let app = TestApp::new();
    let (status, _) = app.call("GET", "/ping/", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("POST", "/users/", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error_not_a_crash() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"firstName\": \"Jane\", oops"))
        .unwrap();
    let (status, body, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Error"], "Missing required fields");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = TestApp::new();
    let huge = "x".repeat(tokengate::gateway::MAX_BODY_SIZE + 1);
    let request = Request::builder()
        .method("POST")
        .uri("/users")
        .body(Body::from(huge))
        .unwrap();
    let response = build_router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn path_traversal_phone_is_rejected() {
    let app = TestApp::new();
    let (status, _) = app
        .call(
            "POST",
            "/users",
            None,
            Some(json!({
                "firstName": "Eve",
                "lastName": "Mallory",
                "phone": "../../../../etc/passwd",
                "password": "secret",
                "tosAgreement": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
