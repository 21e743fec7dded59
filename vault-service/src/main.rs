use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use vault_service::{
    build_router,
    config::VaultConfig,
    db,
    services::{AclService, IdentityService, OAuthClient, TokenService},
    store::{PgStore, Store},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = VaultConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    vault_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting vault service"
    );

    // Persistent store
    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::StoreUnavailable(anyhow::Error::new(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::StoreUnavailable(anyhow::Error::new(e)))?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    tracing::info!("Store initialized");

    // Core services
    let tokens = TokenService::new(&config.jwt).map_err(AppError::ConfigError)?;
    let oauth = OAuthClient::new(
        &config.providers,
        Duration::from_secs(config.outbound_http.timeout_seconds),
    )
    .map_err(AppError::ConfigError)?;
    let identity = IdentityService::new(store.clone());
    let acl = AclService::new(store.clone());
    tracing::info!("Token, identity, and access control services initialized");

    // Rate limiters
    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let register_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.register_attempts,
        config.rate_limit.register_window_seconds,
    );
    let federated_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.federated_attempts,
        config.rate_limit.federated_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Login, Register, Federated, and Global IP");

    let state = AppState {
        config: config.clone(),
        store,
        tokens,
        oauth,
        identity,
        acl,
        login_rate_limiter,
        register_rate_limiter,
        federated_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
