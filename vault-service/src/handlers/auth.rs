use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

use crate::{
    dtos::auth::{
        CallbackQuery, FederatedLoginRequest, LoginRequest, RegisterRequest, RegisterResponse,
        TokenResponse,
    },
    models::{Provider, User},
    services::{metrics, ServiceError},
    store::StoreError,
    utils::{hash_password, Password, ValidatedJson},
    AppState,
};
use service_core::error::AppError;

/// Register a local account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 409, description = "Username or email already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if state
        .store
        .get_user_by_username(&req.username)
        .await
        .map_err(ServiceError::from)?
        .is_some()
    {
        return Err(ServiceError::UsernameTaken.into());
    }

    if let Some(email) = req.email.as_deref() {
        if state
            .store
            .get_user_by_email(email)
            .await
            .map_err(ServiceError::from)?
            .is_some()
        {
            return Err(ServiceError::EmailTaken.into());
        }
    }

    let password_hash = hash_password(&Password::new(req.password)).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Password hashing error: {}", e))
    })?;

    let user = User::new_local(req.username, password_hash.into_string(), req.email);

    // The lookups above race with other registrations; the constraints settle it
    match state.store.create_user(&user).await {
        Ok(()) => {}
        Err(StoreError::Conflict(c)) if c == "users_username_key" => {
            return Err(ServiceError::UsernameTaken.into());
        }
        Err(StoreError::Conflict(c)) if c == "users_email_key" => {
            return Err(ServiceError::EmailTaken.into());
        }
        Err(e) => return Err(ServiceError::from(e).into()),
    }

    tracing::info!(user_id = %user.user_id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.user_id.to_string(),
            message: "Registration successful.".to_string(),
        }),
    ))
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let password = Password::new(req.password);

    let user = match state
        .identity
        .resolve_by_credential(&req.username, &password)
        .await
    {
        Ok(user) => {
            metrics::record_login("password", true);
            user
        }
        Err(e) => {
            metrics::record_login("password", false);
            return Err(e.into());
        }
    };

    let token = state.tokens.issue(&user)?;

    tracing::info!(user_id = %user.user_id, "User logged in");

    Ok((
        StatusCode::OK,
        Json(TokenResponse::new(
            token,
            state.tokens.token_ttl_seconds(),
            user.sanitized(),
        )),
    ))
}

/// Exchange a provider authorization code for a session token
///
/// The browser client completed the provider's consent screen and posts the
/// code here; the server finishes the exchange with its own secret. First
/// login for an unseen subject provisions a user.
#[utoipa::path(
    post,
    path = "/auth/{provider}",
    params(("provider" = String, Path, description = "Identity provider (google or github)")),
    request_body = FederatedLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Account is not usable", body = ErrorResponse),
        (status = 404, description = "Unknown provider", body = ErrorResponse),
        (status = 503, description = "Provider exchange failed", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn federated_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ValidatedJson(req): ValidatedJson<FederatedLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let provider: Provider = provider
        .parse()
        .map_err(|e: String| AppError::NotFound(anyhow::anyhow!(e)))?;

    let claim = match state
        .oauth
        .exchange(provider, &req.code, &req.redirect_uri, &req.client_id, None)
        .await
    {
        Ok(claim) => {
            metrics::record_federated_exchange(provider.as_str(), true);
            claim
        }
        Err(e) => {
            metrics::record_federated_exchange(provider.as_str(), false);
            metrics::record_login(provider.as_str(), false);
            return Err(e.into());
        }
    };

    let user = match state.identity.resolve_or_create(claim).await {
        Ok(user) => {
            metrics::record_login(provider.as_str(), true);
            user
        }
        Err(e) => {
            metrics::record_login(provider.as_str(), false);
            return Err(e.into());
        }
    };

    let token = state.tokens.issue(&user)?;

    tracing::info!(user_id = %user.user_id, provider = %provider, "User logged in via federated provider");

    Ok((
        StatusCode::OK,
        Json(TokenResponse::new(
            token,
            state.tokens.token_ttl_seconds(),
            user.sanitized(),
        )),
    ))
}

/// Start a server-driven federated login: redirect the browser to the
/// provider's consent screen with state and PKCE material in cookies.
pub async fn federated_authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    let provider: Provider = provider
        .parse()
        .map_err(|e: String| AppError::NotFound(anyhow::anyhow!(e)))?;
    let cfg = state
        .oauth
        .provider_config(provider)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Provider {} not configured", provider)))?
        .clone();

    let state_val = uuid::Uuid::new_v4().to_string();
    let code_verifier = {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        use rand::Rng;
        rng.fill(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    };

    let code_challenge = {
        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    };

    let scope = match provider {
        Provider::Google => "openid%20email%20profile",
        Provider::Github => "read:user%20user:email",
    };

    let authorize_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
        cfg.authorize_url, cfg.client_id, cfg.redirect_uri, scope, state_val, code_challenge
    );

    let updated_jar = jar
        .add(
            Cookie::build(("oauth_state", state_val))
                .path("/")
                .http_only(true)
                .secure(true)
                .max_age(time::Duration::minutes(5))
                .build(),
        )
        .add(
            Cookie::build(("code_verifier", code_verifier))
                .path("/")
                .http_only(true)
                .secure(true)
                .max_age(time::Duration::minutes(5))
                .build(),
        );

    Ok((updated_jar, Redirect::to(&authorize_url).into_response()))
}

/// Provider redirect target for the server-driven flow.
pub async fn federated_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Response), AppError> {
    let provider: Provider = provider
        .parse()
        .map_err(|e: String| AppError::NotFound(anyhow::anyhow!(e)))?;

    let stored_state = jar.get("oauth_state").map(|c| c.value());
    if stored_state != Some(query.state.as_str()) {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid OAuth state")));
    }

    let code_verifier = jar
        .get("code_verifier")
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing code verifier")))?;

    let cfg = state
        .oauth
        .provider_config(provider)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Provider {} not configured", provider)))?
        .clone();

    let claim = match state
        .oauth
        .exchange(
            provider,
            &query.code,
            &cfg.redirect_uri,
            &cfg.client_id,
            Some(&code_verifier),
        )
        .await
    {
        Ok(claim) => {
            metrics::record_federated_exchange(provider.as_str(), true);
            claim
        }
        Err(e) => {
            metrics::record_federated_exchange(provider.as_str(), false);
            metrics::record_login(provider.as_str(), false);
            return Err(e.into());
        }
    };

    let user = match state.identity.resolve_or_create(claim).await {
        Ok(user) => {
            metrics::record_login(provider.as_str(), true);
            user
        }
        Err(e) => {
            metrics::record_login(provider.as_str(), false);
            return Err(e.into());
        }
    };

    let token = state.tokens.issue(&user)?;

    tracing::info!(user_id = %user.user_id, provider = %provider, "User logged in via federated callback");

    let redirect_url = format!("{}?access_token={}", cfg.frontend_url, token);

    let updated_jar = jar
        .remove(Cookie::from("oauth_state"))
        .remove(Cookie::from("code_verifier"));

    Ok((updated_jar, Redirect::to(&redirect_url).into_response()))
}
