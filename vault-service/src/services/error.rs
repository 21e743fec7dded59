use service_core::error::AppError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Covers unknown username, missing local credential, and password
    /// mismatch alike; callers cannot tell which.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Covers malformed, expired, mis-signed, and unknown-subject tokens
    /// alike; the real cause goes to the logs only.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("You don't have access to this resource")]
    Forbidden,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("A resource must keep at least one allowed principal")]
    LastPrincipal,

    #[error("Identity provider exchange failed")]
    IdentityProvider(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid username or password"))
            }
            ServiceError::InvalidToken => {
                AppError::AuthError(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::Forbidden => {
                AppError::Forbidden(anyhow::anyhow!("You don't have access to this resource"))
            }
            ServiceError::UsernameTaken => {
                AppError::Conflict(anyhow::anyhow!("Username already taken"))
            }
            ServiceError::EmailTaken => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::LastPrincipal => AppError::Conflict(anyhow::anyhow!(
                "A resource must keep at least one allowed principal"
            )),
            ServiceError::IdentityProvider(e) => {
                tracing::error!(error = ?e, "Identity provider exchange failed");
                AppError::UpstreamFailure("Login failed. Please try again later.".to_string())
            }
            ServiceError::Store(StoreError::Unavailable(e)) => AppError::StoreUnavailable(e),
            ServiceError::Store(StoreError::Conflict(c)) => {
                AppError::Conflict(anyhow::anyhow!("Conflicting write: {}", c))
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
