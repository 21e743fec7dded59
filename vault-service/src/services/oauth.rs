use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{ProviderConfig, ProvidersConfig};
use crate::models::Provider;

use super::ServiceError;

/// Ephemeral identity claim produced per federated login attempt; consumed
/// once by the identity resolver and never persisted as-is.
#[derive(Debug, Clone)]
pub struct ExternalIdentityClaim {
    pub provider: Provider,
    pub subject: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

/// Federated identity exchanger.
///
/// Two sequential outbound calls per login attempt: exchange the
/// authorization code for a provider access token, then fetch the profile
/// with it. No automatic retries; a single failure aborts the attempt.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    providers: HashMap<Provider, ProviderConfig>,
}

impl OAuthClient {
    pub fn new(providers: &ProvidersConfig, timeout: Duration) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let mut map = HashMap::new();
        map.insert(Provider::Google, providers.google.clone());
        map.insert(Provider::Github, providers.github.clone());

        Ok(Self {
            http,
            providers: map,
        })
    }

    pub fn provider_config(&self, provider: Provider) -> Option<&ProviderConfig> {
        self.providers.get(&provider)
    }

    pub async fn exchange(
        &self,
        provider: Provider,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        code_verifier: Option<&str>,
    ) -> Result<ExternalIdentityClaim, ServiceError> {
        let cfg = self.providers.get(&provider).ok_or_else(|| {
            ServiceError::IdentityProvider(anyhow::anyhow!("Provider {} not configured", provider))
        })?;

        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", client_id),
            ("client_secret", cfg.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        // Step 1. Exchange authorization code for access token.
        let token_res = self
            .http
            .post(&cfg.token_url)
            // GitHub answers form-encoded unless asked for JSON
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                ServiceError::IdentityProvider(
                    anyhow::Error::new(e).context("code exchange request failed"),
                )
            })?;

        if !token_res.status().is_success() {
            let status = token_res.status();
            let body = token_res.text().await.unwrap_or_default();
            tracing::error!(provider = %provider, status = %status, body = %body, "Code exchange rejected");
            return Err(ServiceError::IdentityProvider(anyhow::anyhow!(
                "code exchange rejected with status {}",
                status
            )));
        }

        let token: TokenExchangeResponse = token_res.json().await.map_err(|e| {
            ServiceError::IdentityProvider(
                anyhow::Error::new(e).context("malformed token exchange response"),
            )
        })?;

        // Step 2. Retrieve the profile of the authenticated account.
        let profile_res = self
            .http
            .get(&cfg.profile_url)
            .bearer_auth(&token.access_token)
            // GitHub rejects requests without a user agent
            .header(reqwest::header::USER_AGENT, "vault-service")
            .send()
            .await
            .map_err(|e| {
                ServiceError::IdentityProvider(
                    anyhow::Error::new(e).context("profile fetch request failed"),
                )
            })?;

        if !profile_res.status().is_success() {
            let status = profile_res.status();
            tracing::error!(provider = %provider, status = %status, "Profile fetch rejected");
            return Err(ServiceError::IdentityProvider(anyhow::anyhow!(
                "profile fetch rejected with status {}",
                status
            )));
        }

        let profile: serde_json::Value = profile_res.json().await.map_err(|e| {
            ServiceError::IdentityProvider(anyhow::Error::new(e).context("malformed profile"))
        })?;

        claim_from_profile(provider, &profile)
    }
}

fn claim_from_profile(
    provider: Provider,
    profile: &serde_json::Value,
) -> Result<ExternalIdentityClaim, ServiceError> {
    // Google's OIDC userinfo carries a string `sub`; GitHub a numeric `id`.
    let subject = match provider {
        Provider::Google => profile
            .get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        Provider::Github => profile.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string()),
    };

    // Without a stable subject id there is no identity to resolve
    let subject = subject.filter(|s| !s.is_empty()).ok_or_else(|| {
        ServiceError::IdentityProvider(anyhow::anyhow!(
            "{} profile carries no stable subject id",
            provider
        ))
    })?;

    let display_name = match provider {
        Provider::Google => profile.get("name").and_then(|v| v.as_str()),
        Provider::Github => profile
            .get("name")
            .and_then(|v| v.as_str())
            .or_else(|| profile.get("login").and_then(|v| v.as_str())),
    }
    .map(str::to_string);

    let email = profile
        .get("email")
        .and_then(|v| v.as_str())
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    Ok(ExternalIdentityClaim {
        provider,
        subject,
        display_name,
        email,
    })
}
