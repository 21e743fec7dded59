mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{test_config, TestApp};

fn login_req(forwarded_for: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(
            r#"{"username": "alice", "password": "wrong-password"}"#,
        ))
        .unwrap()
}

#[tokio::test]
async fn test_login_attempts_are_rate_limited_per_ip() {
    let mut config = test_config("http://127.0.0.1:1");
    config.rate_limit.login_attempts = 2;
    config.rate_limit.login_window_seconds = 60;
    let app = TestApp::with_config(config).await;

    // Two attempts pass the limiter (and fail authentication)
    for _ in 0..2 {
        let res = app.request(login_req("203.0.113.5")).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    // The third from the same address is throttled
    let res = app.request(login_req("203.0.113.5")).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));

    // A different address is unaffected
    let res = app.request(login_req("198.51.100.7")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_federated_exchange_is_rate_limited() {
    let mut config = test_config("http://127.0.0.1:1");
    config.rate_limit.federated_attempts = 1;
    config.rate_limit.federated_window_seconds = 60;
    let app = TestApp::with_config(config).await;

    let exchange_req = || {
        Request::builder()
            .method("POST")
            .uri("/auth/google")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(
                r#"{"code": "c", "redirectUri": "http://localhost:3000/callback", "clientId": "id"}"#,
            ))
            .unwrap()
    };

    // First attempt reaches the (unreachable) provider and fails upstream
    let res = app.request(exchange_req()).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = app.request(exchange_req()).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unlimited_routes_are_not_throttled_by_the_login_limiter() {
    let mut config = test_config("http://127.0.0.1:1");
    config.rate_limit.login_attempts = 1;
    config.rate_limit.login_window_seconds = 60;
    let app = TestApp::with_config(config).await;

    let res = app.request(login_req("203.0.113.11")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = app.request(login_req("203.0.113.11")).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // Health stays reachable for the throttled address
    let res = app
        .request(
            Request::builder()
                .uri("/health")
                .header("x-forwarded-for", "203.0.113.11")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}
