//! User model - canonical identity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Federated identity providers the service can exchange logins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::Github];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    /// Name of the unique constraint guarding this provider's subject column.
    pub fn subject_constraint(&self) -> &'static str {
        match self {
            Provider::Google => "users_google_subject_key",
            Provider::Github => "users_github_subject_key",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::Github),
            _ => Err(format!("Unknown identity provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User entity. At least one auth path (password hash or a provider
/// subject) is always present; accounts are deactivated, never deleted.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub google_subject: Option<String>,
    pub github_subject: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a local-credential user.
    pub fn new_local(username: String, password_hash: String, email: Option<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username,
            password_hash: Some(password_hash),
            email,
            google_subject: None,
            github_subject: None,
            is_active: true,
            created_utc: Utc::now(),
        }
    }

    /// Create a user provisioned from a federated login.
    pub fn new_federated(
        provider: Provider,
        subject: String,
        username: String,
        email: Option<String>,
    ) -> Self {
        let mut user = Self {
            user_id: Uuid::new_v4(),
            username,
            password_hash: None,
            email,
            google_subject: None,
            github_subject: None,
            is_active: true,
            created_utc: Utc::now(),
        };
        user.set_provider_subject(provider, subject);
        user
    }

    pub fn provider_subject(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Google => self.google_subject.as_deref(),
            Provider::Github => self.github_subject.as_deref(),
        }
    }

    pub fn set_provider_subject(&mut self, provider: Provider, subject: String) {
        match provider {
            Provider::Google => self.google_subject = Some(subject),
            Provider::Github => self.github_subject = Some(subject),
        }
    }

    /// Providers this account is linked to.
    pub fn linked_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.provider_subject(*p).is_some())
            .collect()
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse {
            user_id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
            providers: self.linked_providers(),
            is_active: self.is_active,
            created_utc: self.created_utc,
        }
    }
}

/// User response for the API (no credential material).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub providers: Vec<Provider>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn federated_user_carries_subject_for_its_provider_only() {
        let user = User::new_federated(
            Provider::Github,
            "9001".to_string(),
            "octo".to_string(),
            None,
        );
        assert_eq!(user.provider_subject(Provider::Github), Some("9001"));
        assert_eq!(user.provider_subject(Provider::Google), None);
        assert_eq!(user.linked_providers(), vec![Provider::Github]);
        assert!(user.password_hash.is_none());
    }

    #[test]
    fn sanitized_response_drops_credential_material() {
        let user = User::new_local("alice".to_string(), "$argon2id$stub".to_string(), None);
        let res = user.sanitized();
        assert_eq!(res.username, "alice");
        assert!(res.providers.is_empty());
        // UserResponse has no hash field by construction; assert the flags survived
        assert!(res.is_active);
    }
}
