//! HTTP surface tests driven through the router without a socket.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use roost::server::{AppState, create_router};

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

impl TestApp {
    fn new() -> Self {
        let state = Arc::new(AppState {
            engine: common::engine(),
        });
        Self {
            router: create_router(Arc::clone(&state)),
            state,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        tokens: &[&str],
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for token in tokens {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, value)
    }

    /// Signs a user up over HTTP and returns its bearer token.
    async fn signup(&self, username: &str) -> String {
        let (status, _, _) = self
            .send(
                "POST",
                "/api/v1/users",
                &[],
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": common::PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, body) = self
            .send(
                "POST",
                "/api/v1/token",
                &[],
                Some(json!({ "username": username, "password": common::PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_credentials_challenge() {
    let app = TestApp::new();
    let (status, headers, body) = app.send("GET", "/api/v1/user", &[], None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        headers.get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer realm=\"roost\""
    );
    assert!(body["data"].is_null());
    assert_eq!(body["error"], "no credentials presented");
}

#[tokio::test]
async fn test_header_stuffing_rejected() {
    let app = TestApp::new();
    let tokens: Vec<String> = (0..11).map(|i| format!("junk-{i}")).collect();
    let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();

    let (status, _, _) = app.send("GET", "/api/v1/user", &tokens, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ambiguous_tokens_rejected() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (status, _, body) = app
        .send("GET", "/api/v1/user", &[alice.as_str(), bob.as_str()], None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "tokens resolve to different users");

    let (status, _, body) = app.send("GET", "/api/v1/user", &[alice.as_str()], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_grant_and_revoke_flow() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (_, _, body) = app.send("GET", "/api/v1/user", &[bob.as_str()], None).await;
    let bob_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _, body) = app
        .send("POST", "/api/v1/groups", &[alice.as_str()], Some(json!({ "name": "writers" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _, body) = app
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/applications"),
            &[alice.as_str()],
            Some(json!({ "name": "journal" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let app_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _, body) = app
        .send(
            "POST",
            "/api/v1/resources",
            &[alice.as_str()],
            Some(json!({ "application_id": app_id, "resource_data": { "title": "draft" } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let resource_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, _, body) = app
        .send(
            "GET",
            &format!("/api/v1/resources/{resource_id}/permissions"),
            &[alice.as_str()],
            None,
        )
        .await;
    assert_eq!(
        body["data"],
        json!(["admin", "create", "delete", "read", "update"])
    );

    let check_uri = format!("/api/v1/resources/{resource_id}/permissions/read");
    let (_, _, body) = app.send("GET", &check_uri, &[bob.as_str()], None).await;
    assert_eq!(body["data"]["allowed"], false);

    let grant = json!({ "holder_type": "user", "holder_id": bob_id, "permissions": ["read"] });
    let holders_uri = format!("/api/v1/resources/{resource_id}/holders");
    let (status, _, body) = app
        .send("POST", &holders_uri, &[alice.as_str()], Some(grant.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["outcome"], "granted");

    let (_, _, body) = app
        .send("POST", &holders_uri, &[alice.as_str()], Some(grant.clone()))
        .await;
    assert_eq!(body["data"][0]["outcome"], "already_granted");

    let (_, _, body) = app.send("GET", &check_uri, &[bob.as_str()], None).await;
    assert_eq!(body["data"]["allowed"], true);

    // Bob reads but may not manage grants.
    let (status, _, _) = app
        .send("POST", &holders_uri, &[bob.as_str()], Some(grant.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send("DELETE", &holders_uri, &[alice.as_str()], Some(grant))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["outcome"], "revoked");

    let (_, _, body) = app.send("GET", &check_uri, &[bob.as_str()], None).await;
    assert_eq!(body["data"]["allowed"], false);
}

#[tokio::test]
async fn test_group_limit_maps_to_payment_required() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let identity = app.state.engine.authenticate(&[format!("Bearer {alice}")]).unwrap();
    app.state
        .engine
        .set_user_group_limit(identity.user.id, 1)
        .unwrap();

    let (status, _, _) = app
        .send("POST", "/api/v1/groups", &[alice.as_str()], Some(json!({ "name": "one" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = app
        .send("POST", "/api/v1/groups", &[alice.as_str()], Some(json!({ "name": "two" })))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(
        body["error"],
        "group limit exceeded: user owns 1 of 1 groups"
    );
}

#[tokio::test]
async fn test_unknown_resource_is_not_found() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let (status, _, _) = app
        .send(
            "GET",
            &format!("/api/v1/resources/{}/permissions", uuid::Uuid::new_v4()),
            &[alice.as_str()],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_revoked_token_stops_working() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let (status, _, body) = app
        .send("DELETE", "/api/v1/tokens/current", &[alice.as_str()], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], false);

    let (status, _, _) = app.send("GET", "/api/v1/user", &[alice.as_str()], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.signup("alice").await;

    let (status, _, _) = app
        .send(
            "POST",
            "/api/v1/token",
            &[],
            Some(json!({ "username": "alice", "password": "not the password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_header_count_checked_before_decoding() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let mut builder = Request::get("/api/v1/user");
    for _ in 0..10 {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {alice}"));
    }
    builder = builder.header(
        header::AUTHORIZATION,
        HeaderValue::from_bytes(b"Bearer \xff").unwrap(),
    );

    let response = app
        .router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "too many credentials presented (11, max 10)");
}

#[tokio::test]
async fn test_list_resources_with_filters() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (_, _, body) = app
        .send("POST", "/api/v1/groups", &[alice.as_str()], Some(json!({ "name": "writers" })))
        .await;
    let group_id = body["data"]["id"].as_str().unwrap().to_string();
    let (_, _, body) = app
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/applications"),
            &[alice.as_str()],
            Some(json!({ "name": "journal" })),
        )
        .await;
    let app_id = body["data"]["id"].as_str().unwrap().to_string();

    for kind in ["entry", "draft"] {
        let (status, _, _) = app
            .send(
                "POST",
                "/api/v1/resources",
                &[alice.as_str()],
                Some(json!({ "application_id": app_id, "resource_data": { "type": kind } })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _, body) = app
        .send("GET", "/api/v1/resources", &[alice.as_str()], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, _, body) = app
        .send(
            "GET",
            &format!("/api/v1/resources?application_id={app_id}&type=draft"),
            &[alice.as_str()],
            None,
        )
        .await;
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["resource_data"]["type"], "draft");

    let (_, _, body) = app.send("GET", "/api/v1/resources", &[bob.as_str()], None).await;
    assert_eq!(body["data"], json!([]));

    let (status, _, _) = app
        .send(
            "GET",
            "/api/v1/resources?application_id=not-a-uuid",
            &[alice.as_str()],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
