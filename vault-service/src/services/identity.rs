use std::sync::Arc;

use uuid::Uuid;

use crate::models::User;
use crate::store::{Store, StoreError};
use crate::utils::{verify_password, Password};

use super::{ExternalIdentityClaim, ServiceError};

/// How many provisioning attempts a single federated login may burn through
/// resolving username/email races before giving up.
const MAX_CREATE_ATTEMPTS: usize = 4;

/// Identity resolver: maps verified credentials or federated claims to
/// canonical user records, provisioning on first federated login.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn Store>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve a local credential login.
    ///
    /// The failure is identical whether the username is unknown, the
    /// account has no local credential, the password mismatches, or the
    /// account is deactivated; nothing enumerable leaks.
    pub async fn resolve_by_credential(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<User, ServiceError> {
        let Some(user) = self.store.get_user_by_username(username).await? else {
            return Err(ServiceError::InvalidCredentials);
        };

        let Some(hash) = user.password_hash.as_deref() else {
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password(password, hash) {
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::debug!(user_id = %user.user_id, "Login rejected for deactivated account");
            return Err(ServiceError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Resolve a federated claim to a user, creating one on first login.
    ///
    /// Idempotent per subject id. Concurrent first logins serialize on the
    /// provider-subject unique constraint: the loser of the race gets a
    /// duplicate-key failure and re-resolves by lookup.
    pub async fn resolve_or_create(
        &self,
        claim: ExternalIdentityClaim,
    ) -> Result<User, ServiceError> {
        if let Some(user) = self
            .store
            .get_user_by_provider_subject(claim.provider, &claim.subject)
            .await?
        {
            if !user.is_active {
                tracing::debug!(user_id = %user.user_id, "Federated login rejected for deactivated account");
                return Err(ServiceError::InvalidCredentials);
            }
            return Ok(user);
        }

        let mut username = self.available_username(&claim).await?;
        let mut email = self.claimable_email(&claim).await?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let user = User::new_federated(
                claim.provider,
                claim.subject.clone(),
                username.clone(),
                email.clone(),
            );

            match self.store.create_user(&user).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %user.user_id,
                        provider = %claim.provider,
                        "Provisioned user from federated login"
                    );
                    return Ok(user);
                }
                Err(StoreError::Conflict(c)) if c == claim.provider.subject_constraint() => {
                    // Lost the first-login race; the created record wins
                    return self
                        .store
                        .get_user_by_provider_subject(claim.provider, &claim.subject)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::Internal(anyhow::anyhow!(
                                "user vanished after duplicate-subject conflict"
                            ))
                        });
                }
                Err(StoreError::Conflict(c)) if c == "users_email_key" => {
                    // Someone else holds the email; create without claiming it
                    email = None;
                }
                Err(StoreError::Conflict(c)) if c == "users_username_key" => {
                    username = disambiguate(&username);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Internal(anyhow::anyhow!(
            "could not provision user after {} attempts",
            MAX_CREATE_ATTEMPTS
        )))
    }

    /// Default username from the profile display name, disambiguated if it
    /// collides with an existing one.
    async fn available_username(&self, claim: &ExternalIdentityClaim) -> Result<String, ServiceError> {
        let base = claim
            .display_name
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}-{}", claim.provider, claim.subject));

        if self.store.get_user_by_username(&base).await?.is_none() {
            return Ok(base);
        }
        Ok(disambiguate(&base))
    }

    /// The claim's email, unless another account already holds it.
    async fn claimable_email(
        &self,
        claim: &ExternalIdentityClaim,
    ) -> Result<Option<String>, ServiceError> {
        let Some(email) = claim.email.as_deref() else {
            return Ok(None);
        };
        if self.store.get_user_by_email(email).await?.is_some() {
            tracing::debug!(provider = %claim.provider, "Email already claimed; provisioning without it");
            return Ok(None);
        }
        Ok(Some(email.to_string()))
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c == ' ' || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn disambiguate(base: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use crate::store::MemoryStore;
    use crate::utils::hash_password;

    fn claim(subject: &str, name: Option<&str>, email: Option<&str>) -> ExternalIdentityClaim {
        ExternalIdentityClaim {
            provider: Provider::Google,
            subject: subject.to_string(),
            display_name: name.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    fn service() -> (IdentityService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (IdentityService::new(store.clone()), store)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Jane Doe"), "jane-doe");
        assert_eq!(slugify("  weird -- Name_42 "), "weird-name-42");
        assert_eq!(slugify("---"), "");
    }

    #[tokio::test]
    async fn test_resolve_by_credential_roundtrip() {
        let (identity, store) = service();
        let password = Password::new("correct horse battery".to_string());
        let hash = hash_password(&password).unwrap();
        let user = User::new_local("alice".to_string(), hash.into_string(), None);
        store.create_user(&user).await.unwrap();

        let resolved = identity
            .resolve_by_credential("alice", &password)
            .await
            .unwrap();
        assert_eq!(resolved.user_id, user.user_id);
    }

    #[tokio::test]
    async fn test_credential_failure_is_non_enumerable() {
        let (identity, store) = service();
        let hash = hash_password(&Password::new("right".to_string())).unwrap();
        let user = User::new_local("alice".to_string(), hash.into_string(), None);
        store.create_user(&user).await.unwrap();

        let wrong_password = identity
            .resolve_by_credential("alice", &Password::new("wrong".to_string()))
            .await
            .unwrap_err();
        let unknown_user = identity
            .resolve_by_credential("nobody", &Password::new("wrong".to_string()))
            .await
            .unwrap_err();

        // Same error whether the username exists or not
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(matches!(wrong_password, ServiceError::InvalidCredentials));
        assert!(matches!(unknown_user, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_deactivated_account_cannot_login() {
        let (identity, store) = service();
        let password = Password::new("correct".to_string());
        let hash = hash_password(&password).unwrap();
        let user = User::new_local("alice".to_string(), hash.into_string(), None);
        store.create_user(&user).await.unwrap();
        store.set_user_active(user.user_id, false).await.unwrap();

        assert!(matches!(
            identity.resolve_by_credential("alice", &password).await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_resolve_or_create_is_idempotent() {
        let (identity, _) = service();

        let first = identity
            .resolve_or_create(claim("sub-1", Some("Jane Doe"), Some("jane@example.com")))
            .await
            .unwrap();
        let second = identity
            .resolve_or_create(claim("sub-1", Some("Jane Doe"), Some("jane@example.com")))
            .await
            .unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.username, "jane-doe");
        assert_eq!(first.email.as_deref(), Some("jane@example.com"));
    }

    #[tokio::test]
    async fn test_concurrent_first_logins_create_one_user() {
        let (identity, _) = service();

        let a = identity.clone();
        let b = identity.clone();
        let (first, second) = tokio::join!(
            a.resolve_or_create(claim("sub-race", Some("Racer"), None)),
            b.resolve_or_create(claim("sub-race", Some("Racer"), None)),
        );

        assert_eq!(first.unwrap().user_id, second.unwrap().user_id);
    }

    #[tokio::test]
    async fn test_username_collision_is_disambiguated() {
        let (identity, store) = service();
        let taken = User::new_local(
            "jane-doe".to_string(),
            "$argon2id$stub".to_string(),
            None,
        );
        store.create_user(&taken).await.unwrap();

        let user = identity
            .resolve_or_create(claim("sub-2", Some("Jane Doe"), None))
            .await
            .unwrap();

        assert_ne!(user.user_id, taken.user_id);
        assert!(user.username.starts_with("jane-doe-"));
    }

    #[tokio::test]
    async fn test_email_collision_creates_user_without_email() {
        let (identity, store) = service();
        let holder = User::new_local(
            "holder".to_string(),
            "$argon2id$stub".to_string(),
            Some("jane@example.com".to_string()),
        );
        store.create_user(&holder).await.unwrap();

        // The login must not fail; the email just isn't claimed
        let user = identity
            .resolve_or_create(claim("sub-3", Some("Jane"), Some("jane@example.com")))
            .await
            .unwrap();

        assert!(user.email.is_none());
        assert_eq!(user.provider_subject(Provider::Google), Some("sub-3"));
    }

    #[tokio::test]
    async fn test_subject_without_display_name_gets_provider_username() {
        let (identity, _) = service();

        let user = identity
            .resolve_or_create(claim("raw-sub", None, None))
            .await
            .unwrap();
        assert_eq!(user.username, "google-raw-sub");
    }
}
