//! Request guard: the per-request gate in front of every protected route.
//!
//! Extracts the bearer token, validates it, and resolves the subject to an
//! active user before the handler runs. Any failure past extraction
//! collapses to the one generic 401; the actual cause only reaches the
//! logs.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{dtos::ErrorResponse, models::User, services::metrics, AppState};

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing or invalid Authorization header".to_string(),
                }),
            ));
        }
    };

    let user = match resolve_subject(&state, token).await {
        Ok(user) => {
            metrics::record_token_validation(true);
            user
        }
        Err(reason) => {
            metrics::record_token_validation(false);
            tracing::debug!(reason, "Rejected bearer token");
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or expired token".to_string(),
                }),
            ));
        }
    };

    // Hand the trusted user to the handler through request extensions
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Decode the token and confirm its subject is a live account. The error is
/// a log-only reason string; callers see none of it.
async fn resolve_subject(state: &AppState, token: &str) -> Result<User, &'static str> {
    let claims = state
        .tokens
        .decode(token)
        .map_err(|_| "signature or expiry check failed")?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "subject is not a user id")?;

    let user = state
        .store
        .get_user_by_id(user_id)
        .await
        .map_err(|_| "store lookup failed")?
        .ok_or("subject does not resolve to a user")?;

    // Deactivation is the only revocation mechanism for outstanding tokens
    if !user.is_active {
        return Err("subject is deactivated");
    }

    Ok(user)
}

/// Extractor handing the guard-resolved user to handlers.
#[derive(Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<CurrentUser>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "User context missing from request extensions".to_string(),
            }),
        ))?;

        Ok(user.clone())
    }
}
