mod common;

use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[tokio::test]
async fn health_reports_ok_with_timestamp() {
    let ctx = TestContext::new().await;
    let resp = ctx.get("/api/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert_eq!(body["status"], "ok");
    let time = body["time"].as_str().expect("time is a string");
    assert!(OffsetDateTime::parse(time, &Rfc3339).is_ok());
}

#[tokio::test]
async fn message_reports_environment() {
    let ctx = TestContext::new().await;
    let body = ctx.get("/api/message", None).await.json();
    assert_eq!(body["message"], "Citricloud backend is online.");
    assert_eq!(body["environment"], "test");
}

#[tokio::test]
async fn register_returns_created_with_token() {
    let ctx = TestContext::new().await;
    let resp = ctx.register("Ada@Example.com ", "correct-horse-battery").await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let body = resp.json();
    assert!(body["message"].is_string());
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let ctx = TestContext::new().await;
    assert_eq!(
        ctx.register("dup@example.com", "correct-horse-battery").await.status,
        StatusCode::CREATED
    );
    let second = ctx.register("DUP@example.com", "another-password").await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.json()["error"], "conflict");
}

#[tokio::test]
async fn short_password_is_rejected() {
    let ctx = TestContext::new().await;
    let resp = ctx.register("short@example.com", "1234567").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Nothing was stored: the same email can still register.
    let retry = ctx.register("short@example.com", "12345678").await;
    assert_eq!(retry.status, StatusCode::CREATED);
}

#[tokio::test]
async fn missing_fields_and_bad_json_are_bad_requests() {
    let ctx = TestContext::new().await;

    let resp = ctx.post_json("/api/auth/register", json!({ "email": "a@b.co" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = ctx.post_json("/api/auth/login", json!({ "password": "whatever1" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = ctx.post_json("/api/auth/register", json!({ "email": "not-an-email", "password": "long-enough" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    assert_eq!(ctx.send(req).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let ctx = TestContext::new().await;
    ctx.register("ada@example.com", "correct-horse-battery").await;

    let wrong_password = ctx.login("ada@example.com", "wrong-password").await;
    let unknown_email = ctx.login("ghost@example.com", "correct-horse-battery").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
}

#[tokio::test]
async fn login_issues_working_token() {
    let ctx = TestContext::new().await;
    ctx.register("ada@example.com", "correct-horse-battery").await;

    let resp = ctx.login(" ADA@example.com", "correct-horse-battery").await;
    assert_eq!(resp.status, StatusCode::OK);
    let token = resp.json()["access_token"].as_str().unwrap().to_string();

    let me = ctx.get("/api/auth/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn registration_token_authenticates_me() {
    let ctx = TestContext::new().await;
    let token = ctx.token_for("grace@example.com").await;

    let me = ctx.get("/api/auth/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    let user = &me.json()["user"];
    assert_eq!(user["email"], "grace@example.com");
    assert!(user["id"].as_i64().unwrap() > 0);
    assert!(OffsetDateTime::parse(user["created_at"].as_str().unwrap(), &Rfc3339).is_ok());
}

#[tokio::test]
async fn token_is_accepted_from_query_parameter() {
    let ctx = TestContext::new().await;
    let token = ctx.token_for("query@example.com").await;

    let me = ctx.get(&format!("/api/auth/me?token={}", token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["user"]["email"], "query@example.com");
}

#[tokio::test]
async fn me_rejects_missing_tampered_and_foreign_tokens() {
    let ctx = TestContext::new().await;
    let token = ctx.token_for("ada@example.com").await;

    assert_eq!(ctx.get("/api/auth/me", None).await.status, StatusCode::UNAUTHORIZED);

    let (head, sig) = token.rsplit_once('.').unwrap();
    let flipped = if sig.starts_with('A') { 'B' } else { 'A' };
    let tampered = format!("{}.{}{}", head, flipped, &sig[1..]);
    assert_eq!(
        ctx.get("/api/auth/me", Some(&tampered)).await.status,
        StatusCode::UNAUTHORIZED
    );

    let mut cfg = ctx.state.config.jwt.clone();
    cfg.secret = "someone-elses-secret".into();
    let foreign = citricloud::auth::JwtKeys::from_config(&cfg).sign(1, "ada@example.com").unwrap();
    assert_eq!(
        ctx.get("/api/auth/me", Some(&foreign)).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn me_rejects_expired_token() {
    let ctx = TestContext::new().await;
    let keys = citricloud::auth::JwtKeys::from_config(&ctx.state.config.jwt);
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = citricloud::auth::claims::Claims {
        sub: 1,
        email: "old@example.com".into(),
        iat: (now - 10 * 24 * 3600) as usize,
        exp: (now - 3 * 24 * 3600) as usize,
        iss: keys.issuer.clone(),
        aud: keys.audience.clone(),
    };
    let token = jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &keys.encoding).unwrap();

    let resp = ctx.get("/api/auth/me", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json()["error"], "unauthorized");
}
