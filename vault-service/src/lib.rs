pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, SwaggerMode, VaultConfig};
use crate::services::{AclService, IdentityService, OAuthClient, ServiceError, TokenService};
use crate::store::Store;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::federated_login,
        handlers::user::get_me,
        handlers::user::change_password,
        handlers::item::list_items,
        handlers::item::create_item,
        handlers::item::get_item,
        handlers::item::update_item,
        handlers::item::delete_item,
        handlers::item::grant_item_principal,
        handlers::item::revoke_item_principal,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::LoginRequest,
            dtos::auth::FederatedLoginRequest,
            dtos::auth::TokenResponse,
            dtos::item::CreateItemRequest,
            dtos::item::UpdateItemRequest,
            dtos::item::ItemListResponse,
            dtos::item::ServiceListResponse,
            dtos::item::GrantRequest,
            dtos::item::CreateServiceRequest,
            dtos::item::UpdateServiceRequest,
            dtos::group::CreateGroupRequest,
            dtos::group::AddMemberRequest,
            dtos::group::GroupListResponse,
            handlers::user::ChangePasswordRequest,
            models::Provider,
            models::UserResponse,
            models::ItemResponse,
            models::ServiceEntryResponse,
            models::GroupResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Credential and federated login"),
        (name = "User", description = "User profile management"),
        (name = "Items", description = "Shared vault items and their principals"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: VaultConfig,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub oauth: OAuthClient,
    pub identity: IdentityService,
    pub acl: AclService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub federated_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Login route with its own limiter
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    // Registration route with its own limiter
    let register_limiter = state.register_rate_limiter.clone();
    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            register_limiter,
            ip_rate_limit_middleware,
        ));

    // Federated exchange routes share one limiter across providers
    let federated_limiter = state.federated_rate_limiter.clone();
    let federated_routes = Router::new()
        .route("/auth/:provider", post(handlers::auth::federated_login))
        .route(
            "/auth/:provider/authorize",
            get(handlers::auth::federated_authorize),
        )
        .route(
            "/auth/:provider/callback",
            get(handlers::auth::federated_callback),
        )
        .layer(from_fn_with_state(
            federated_limiter,
            ip_rate_limit_middleware,
        ));

    // Everything behind the request guard
    let protected_routes = Router::new()
        .route("/users/me", get(handlers::user::get_me))
        .route("/users/me/password", post(handlers::user::change_password))
        .route(
            "/items",
            get(handlers::item::list_items).post(handlers::item::create_item),
        )
        .route(
            "/items/:id",
            get(handlers::item::get_item)
                .put(handlers::item::update_item)
                .delete(handlers::item::delete_item),
        )
        .route(
            "/items/:id/principals",
            post(handlers::item::grant_item_principal),
        )
        .route(
            "/items/:id/principals/:user_id",
            delete(handlers::item::revoke_item_principal),
        )
        .route(
            "/items/:id/services",
            get(handlers::service_entry::list_item_services)
                .post(handlers::service_entry::create_item_service),
        )
        .route(
            "/services/:id",
            get(handlers::service_entry::get_service)
                .put(handlers::service_entry::update_service)
                .delete(handlers::service_entry::delete_service),
        )
        .route(
            "/services/:id/principals",
            post(handlers::service_entry::grant_service_principal),
        )
        .route(
            "/services/:id/principals/:user_id",
            delete(handlers::service_entry::revoke_service_principal),
        )
        .route(
            "/groups",
            get(handlers::group::list_my_groups).post(handlers::group::create_group),
        )
        .route("/groups/:id/members", post(handlers::group::add_group_member))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => match state.config.swagger.enabled {
            SwaggerMode::Public | SwaggerMode::Authenticated => true,
            SwaggerMode::Disabled => false,
        },
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        // Keep the OpenAPI JSON available for programmatic access
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        );
    }

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = app
        .merge(login_route)
        .merge(register_route)
        .merge(federated_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Tracing layer with request id propagation
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| match o.parse::<axum::http::HeaderValue>() {
                            Ok(v) => Some(v),
                            Err(e) => {
                                tracing::error!("Invalid CORS origin '{}': {}", o, e);
                                None
                            }
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.store.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(ServiceError::from(e))
    })?;

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
