use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::models::User;

use super::ServiceError;

/// Token service: issues and decodes the stateless session tokens.
///
/// There is no server-side session store and no blacklist; a token dies by
/// expiring or by its subject being deactivated. That makes the validity
/// window the only bound on a leaked token, so it defaults short.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_minutes: i64,
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (internal user id)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        anyhow::ensure!(
            config.secret.len() >= 32,
            "JWT secret must be at least 32 bytes"
        );

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            token_ttl_minutes: config.token_ttl_minutes,
        })
    }

    /// Issue a signed token for a user, valid for the configured window.
    pub fn issue(&self, user: &User) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.token_ttl_minutes);

        let claims = Claims {
            sub: user.user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Decode and verify a token.
    ///
    /// Every failure collapses to the one generic error; the specific cause
    /// is only logged.
    pub fn decode(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // No leeway: the expiry window is exact
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Token validation failed");
                Err(ServiceError::InvalidToken)
            }
        }
    }

    /// Token validity in seconds (reported to clients)
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_minutes * 60
    }
}
