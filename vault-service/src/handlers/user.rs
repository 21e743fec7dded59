use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dtos::MessageResponse,
    middleware::CurrentUser,
    services::ServiceError,
    utils::{hash_password, verify_password, Password, ValidatedJson},
    AppState,
};
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    pub new_password: String,
}

/// Current user profile
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(user.sanitized())
}

/// Change the local credential; requires the current one
#[utoipa::path(
    post,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password rejected", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Pure federated accounts have no credential to change
    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err(ServiceError::InvalidCredentials.into());
    };

    if !verify_password(&Password::new(req.current_password), stored_hash) {
        return Err(ServiceError::InvalidCredentials.into());
    }

    let new_hash = hash_password(&Password::new(req.new_password)).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Password hashing error: {}", e))
    })?;

    state
        .store
        .set_user_password(user.user_id, new_hash.as_str())
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(user_id = %user.user_id, "Password changed");

    Ok(Json(MessageResponse::new("Password changed")))
}
