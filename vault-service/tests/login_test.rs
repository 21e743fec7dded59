mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_login_issues_token_that_round_trips() {
    let app = TestApp::spawn().await;
    let (user_id, token) = app.register_and_login("alice", "correct horse battery").await;

    let res = app.get_auth("/users/me", &token).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["user_id"], user_id.to_string());
    assert_eq!(body["username"], "alice");
    // Credential material never appears in responses
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_token_response_shape() {
    let app = TestApp::spawn().await;
    app.register_and_login("alice", "correct horse battery").await;

    let res = app
        .post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 15 * 60);
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn test_login_failure_is_non_enumerable() {
    let app = TestApp::spawn().await;
    app.register_and_login("alice", "correct horse battery").await;

    let wrong_password = app
        .post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "wrong" }),
        )
        .await;
    let unknown_user = app
        .post_json(
            "/auth/login",
            json!({ "username": "nobody", "password": "wrong" }),
        )
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    // Identical bodies: nothing reveals whether the username exists
    let a = body_json(wrong_password).await;
    let b = body_json(unknown_user).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_deactivated_account_cannot_login() {
    let app = TestApp::spawn().await;
    let (user_id, _) = app.register_and_login("alice", "correct horse battery").await;

    app.state.store.set_user_active(user_id, false).await.unwrap();

    let res = app
        .post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_requires_current() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("alice", "correct horse battery").await;

    let res = app
        .post_json_auth(
            "/users/me/password",
            &token,
            json!({ "current_password": "not the password", "new_password": "a new long password" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .post_json_auth(
            "/users/me/password",
            &token,
            json!({ "current_password": "correct horse battery", "new_password": "a new long password" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    // Old credential is dead, new one works
    let res = app
        .post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "a new long password" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}
