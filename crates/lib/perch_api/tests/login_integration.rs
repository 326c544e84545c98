//! Password login through the router.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{SESSION_SECS, TestApp, cookie, cookie_value, json};
use perch_api::{AppState, router};
use perch_core::auth::csrf;
use perch_core::auth::jwt::JwtCell;
use perch_core::auth::password::hash_password;
use perch_core::auth::token::{TokenKind, parse};
use perch_core::models::auth::AuthCredential;
use perch_core::store::Store;
use serde_json::json as body;

const LOGIN: &str = "/api/auth/login";

fn login_request(username: &str, password: &str) -> axum::http::Request<axum::body::Body> {
    json(
        "POST",
        LOGIN,
        &[],
        body!({ "username": username, "password": password }),
    )
}

#[tokio::test]
async fn valid_credentials_issue_cookie_and_bearer() {
    let t = TestApp::new().await;
    let (status, headers, json) = t.send(login_request("alice", "correct-pw")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["expires_in"], SESSION_SECS);
    assert!(json.get("message").is_none());

    let bearer = json["token"].as_str().expect("token");
    let claims = t.state.jwt.verify(bearer).expect("bearer is a server jwt");
    assert_eq!(claims.login, "alice");

    let session = cookie(&headers, "perch_sess").expect("session cookie");
    assert!(session.contains("HttpOnly"));
    let token = parse(&[TokenKind::Session], &cookie_value(&session), |_| {
        Ok(t.alice.hash.clone())
    })
    .expect("session token verifies against the user secret");
    assert_eq!(token.user_id(), Some(t.alice.id));

    let csrf_cookie = cookie(&headers, "perch_csrf").expect("csrf cookie");
    assert!(!csrf_cookie.contains("HttpOnly"));
    assert_eq!(
        cookie_value(&csrf_cookie),
        csrf::proof(&t.alice.hash, t.alice.id).unwrap()
    );
}

#[tokio::test]
async fn username_is_trimmed() {
    let t = TestApp::new().await;
    let (status, _, _) = t.send(login_request("  alice ", "correct-pw")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let t = TestApp::new().await;
    let (s1, h1, wrong_pw) = t.send(login_request("alice", "wrong-pw")).await;
    let (s2, _, unknown) = t.send(login_request("mallory", "correct-pw")).await;

    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw, body!({ "success": false, "message": "invalid credentials" }));
    assert_eq!(wrong_pw, unknown);
    assert!(cookie(&h1, "perch_sess").is_none());
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let t = TestApp::new().await;
    for (username, password) in [("", "pw"), ("alice", ""), ("   ", "pw"), ("alice", "   ")] {
        let (status, _, json) = t.send(login_request(username, password)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{username:?}/{password:?}");
        assert_eq!(json["message"], "username and password required");
    }
}

#[tokio::test]
async fn malformed_payload_is_a_bad_request() {
    let t = TestApp::new().await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri(LOGIN)
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, _, json) = t.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, body!({ "success": false, "message": "invalid payload" }));
}

#[tokio::test]
async fn dangling_credential_is_unauthorized() {
    let t = TestApp::new().await;
    t.store
        .create_credential(AuthCredential::new(
            999,
            "ghost",
            hash_password("boo").unwrap(),
        ))
        .await
        .unwrap();
    let (status, _, json) = t.send(login_request("ghost", "boo")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "invalid credentials");
}

#[tokio::test]
async fn unconfigured_jwt_falls_back_to_session_token() {
    let t = TestApp::new().await;
    let state = AppState {
        store: t.store.clone() as Arc<dyn Store>,
        config: common::config(),
        jwt: Arc::new(JwtCell::new()),
    };
    let app = router(state);

    let (status, headers, json) = common::send(&app, login_request("alice", "correct-pw")).await;
    assert_eq!(status, StatusCode::OK);
    let session = cookie_value(&cookie(&headers, "perch_sess").unwrap());
    assert_eq!(json["token"], session);
}

#[tokio::test]
async fn forwarded_https_marks_cookies_secure() {
    let t = TestApp::new().await;
    let request = json(
        "POST",
        LOGIN,
        &[("x-forwarded-proto", "https")],
        body!({ "username": "alice", "password": "correct-pw" }),
    );
    let (status, headers, _) = t.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie(&headers, "perch_sess").unwrap().contains("Secure"));
}
