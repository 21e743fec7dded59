//! Shared harness for vault-service integration tests.
//!
//! Tests drive the full router over an in-memory store; the federated login
//! suite additionally runs a stub provider on a local listener.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use service_core::middleware::rate_limit::create_ip_rate_limiter;
use vault_service::config::{
    DatabaseConfig, Environment, JwtConfig, OutboundHttpConfig, ProviderConfig, ProvidersConfig,
    RateLimitConfig, SecurityConfig, SwaggerConfig, SwaggerMode, VaultConfig,
};
use vault_service::services::{AclService, IdentityService, OAuthClient, TokenService};
use vault_service::store::{MemoryStore, Store};
use vault_service::{build_router, AppState};

pub const TEST_JWT_SECRET: &str = "integration-test-signing-secret-0123456789";

/// A config wired for tests: in-memory-friendly, permissive limits, and
/// provider endpoints pointing at `provider_base`.
pub fn test_config(provider_base: &str) -> VaultConfig {
    let provider = ProviderConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        authorize_url: format!("{}/authorize", provider_base),
        token_url: format!("{}/token", provider_base),
        profile_url: format!("{}/profile", provider_base),
        redirect_uri: "http://localhost:3000/callback".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
    };

    VaultConfig {
        common: service_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "vault-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused-in-tests/vault".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            token_ttl_minutes: 15,
        },
        providers: ProvidersConfig {
            google: provider.clone(),
            github: provider,
        },
        outbound_http: OutboundHttpConfig { timeout_seconds: 5 },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            register_attempts: 1000,
            register_window_seconds: 60,
            federated_attempts: 1000,
            federated_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Spawn with provider endpoints pointing nowhere; federated exchanges
    /// fail fast if a test reaches them by accident.
    pub async fn spawn() -> Self {
        Self::with_config(test_config("http://127.0.0.1:1")).await
    }

    pub async fn with_provider(provider_base: &str) -> Self {
        Self::with_config(test_config(provider_base)).await
    }

    pub async fn with_config(config: VaultConfig) -> Self {
        vault_service::services::metrics::init_metrics();

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let tokens = TokenService::new(&config.jwt).expect("Failed to create token service");
        let oauth = OAuthClient::new(
            &config.providers,
            Duration::from_secs(config.outbound_http.timeout_seconds),
        )
        .expect("Failed to create OAuth client");
        let identity = IdentityService::new(store.clone());
        let acl = AclService::new(store.clone());

        let state = AppState {
            config: config.clone(),
            store,
            tokens,
            oauth,
            identity,
            acl,
            login_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            register_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.register_attempts,
                config.rate_limit.register_window_seconds,
            ),
            federated_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.federated_attempts,
                config.rate_limit.federated_window_seconds,
            ),
            ip_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.global_ip_limit,
                config.rate_limit.global_ip_window_seconds,
            ),
        };

        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self { router, state }
    }

    pub async fn request(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, path: &str) -> Response {
        self.request(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> Response {
        self.request(
            Request::builder()
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json_auth(&self, path: &str, token: &str, body: Value) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn put_json_auth(&self, path: &str, token: &str, body: Value) -> Response {
        self.request(
            Request::builder()
                .method("PUT")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> Response {
        self.request(
            Request::builder()
                .method("DELETE")
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Register a local account and log it in, returning (user id, token).
    pub async fn register_and_login(&self, username: &str, password: &str) -> (Uuid, String) {
        let res = self
            .post_json(
                "/auth/register",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED, "registration failed");

        let res = self
            .post_json(
                "/auth/login",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK, "login failed");

        let body = body_json(res).await;
        let token = body["access_token"].as_str().unwrap().to_string();
        let user_id = Uuid::parse_str(body["user"]["user_id"].as_str().unwrap()).unwrap();
        (user_id, token)
    }
}

pub async fn body_json(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("response was not JSON: {}", e))
}

/// Serve a stand-in identity provider on an ephemeral local port.
///
/// Answers the token endpoint with `token_status` and the profile endpoint
/// with `profile`. Returns the base URL.
pub async fn spawn_stub_provider(token_status: StatusCode, profile: Value) -> String {
    let token_handler = move || async move {
        if token_status.is_success() {
            (
                StatusCode::OK,
                Json(json!({ "access_token": "stub-access-token", "token_type": "Bearer" })),
            )
                .into_response()
        } else {
            (token_status, Json(json!({ "error": "server_error" }))).into_response()
        }
    };

    let profile_handler = move || {
        let profile = profile.clone();
        async move { Json(profile) }
    };

    let app = Router::new()
        .route("/token", post(token_handler))
        .route("/profile", get(profile_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub provider");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://{}", addr)
}
