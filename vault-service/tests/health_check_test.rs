mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};

#[tokio::test]
async fn test_health_check_reports_store_up() {
    let app = TestApp::spawn().await;

    let res = app.get("/health").await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "vault-service");
    assert_eq!(body["checks"]["store"], "up");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_auth_counters() {
    let app = TestApp::spawn().await;

    // A failed login gives the counter at least one sample
    let res = app
        .post_json(
            "/auth/login",
            serde_json::json!({ "username": "nobody", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.get("/metrics").await;
    assert_eq!(res.status(), StatusCode::OK);

    let bytes = http_body_util::BodyExt::collect(res.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("vault_login_attempts_total"));
}

#[tokio::test]
async fn test_openapi_json_is_served() {
    let app = TestApp::spawn().await;

    let res = app.get("/.well-known/openapi.json").await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert!(body["paths"]["/auth/login"].is_object());
}
