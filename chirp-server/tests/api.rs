use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chirp_core::Config;
use chirp_server::{router, ServerContext, SESSION_COOKIE};
use chirp_social::{Integrations, MemoryDatabase, Social};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let social = Social::new(
        Arc::new(MemoryDatabase::new()),
        Integrations::default(),
        Config::default(),
    );

    router(ServerContext::new(Arc::new(social)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, body)
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    builder.body(Body::empty()).unwrap()
}

/// Registers a user and returns a session token for it
async fn sign_up(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        post(
            "/api/auth/register",
            None,
            json!({ "username": username, "password": "hunter2hunter2", "name": username }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        post(
            "/api/auth/login",
            None,
            json!({ "username": username, "password": "hunter2hunter2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = app();
    sign_up(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(post(
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();

    assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie.split(';').next().unwrap().to_string();
    let request = Request::get("/api/auth/user")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, _) = send(
        &app,
        post(
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let app = app();
    sign_up(&app, "alice").await;

    let (status, _) = send(
        &app,
        post(
            "/api/auth/register",
            None,
            json!({ "username": "alice", "password": "hunter2hunter2", "name": "Alice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        post(
            "/api/auth/register",
            None,
            json!({ "username": "bad name", "password": "hunter2hunter2", "name": "Bad" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        post(
            "/api/auth/register",
            None,
            json!({ "username": "bob", "password": "short", "name": "Bob" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_without_session_are_refused() {
    let app = app();

    let (status, body) = send(&app, post("/api/tweets", None, json!({ "text": "hi" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization");

    let (status, _) = send(&app, get("/api/timeline", Some("not-a-session"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tweets_and_timeline() {
    let app = app();
    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;

    let (status, body) = send(
        &app,
        post("/api/tweets", Some(&alice), json!({ "text": "hello chirp" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tweet_id = body["tweet"]["id"].as_i64().unwrap();

    let (status, _) = send(&app, post("/api/tweets", Some(&alice), json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post("/api/users/alice/follow", Some(&bob), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/api/timeline", Some(&bob))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["tweet"]["text"], "hello chirp");

    let like = format!("/api/tweets/{}/like", tweet_id);
    let (status, body) = send(&app, post(&like, Some(&bob), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likeCount"], 1);
    assert_eq!(body["liked"], true);

    let (status, _) = send(&app, post(&like, Some(&bob), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let delete = Request::delete(format!("/api/tweets/{}", tweet_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", bob))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, get("/api/notifications/unread-count", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_unconfigured_integrations() {
    let app = app();
    let alice = sign_up(&app, "alice").await;

    let (status, body) = send(&app, get("/api/livekit?room=call-1", Some(&alice))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("LiveKit"));

    let (status, _) = send(&app, get("/api/livekit?room=call-1&username=bob", Some(&alice))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, get("/api/canvas/courses", Some(&alice))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(&app, post("/api/moderate", None, json!({ "text": "hello" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    assert_eq!(body["moderated"], false);
}

#[tokio::test]
async fn test_video_call_actions() {
    let app = app();
    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;

    let (status, body) = send(
        &app,
        post(
            "/api/video-call",
            Some(&alice),
            json!({ "action": "initiate", "callees": ["bob"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call"]["status"], "ringing");
    assert!(body["access"].is_null());
    let call_id = body["call"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, get("/api/calls/incoming", Some(&bob))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["callId"], call_id);

    let (status, body) = send(
        &app,
        post(
            "/api/video-call",
            Some(&bob),
            json!({ "action": "decline", "callId": call_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ended");

    let (status, _) = send(
        &app,
        post(
            "/api/video-call",
            Some(&bob),
            json!({ "action": "accept", "callId": call_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_debug_reports_configuration() {
    let app = app();

    let (status, body) = send(&app, get("/api/debug", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["integrations"]["livekit"], false);
    assert_eq!(body["korn"]["enabled"], false);

    let (status, body) = send(&app, get("/api/api.json", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/video-call"].is_object());
}
