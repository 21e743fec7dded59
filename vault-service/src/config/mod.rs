use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub providers: ProvidersConfig,
    pub outbound_http: OutboundHttpConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub token_ttl_minutes: i64,
}

impl JwtConfig {
    /// Tokens cannot be revoked individually, so the default window stays
    /// short to bound what a leaked token is worth.
    pub const DEFAULT_TTL_MINUTES: i64 = 15;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub google: ProviderConfig,
    pub github: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub redirect_uri: String,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboundHttpConfig {
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Authenticated,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub federated_attempts: u32,
    pub federated_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl VaultConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = VaultConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("vault-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", Some("postgres://localhost/vault"), is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            jwt: JwtConfig {
                secret: get_env(
                    "JWT_SECRET",
                    Some("dev-only-signing-secret-0123456789abcdef"),
                    is_prod,
                )?,
                token_ttl_minutes: parse_env(
                    "JWT_TOKEN_TTL_MINUTES",
                    "15",
                    is_prod,
                )?,
            },
            providers: ProvidersConfig {
                google: ProviderConfig {
                    client_id: get_env("GOOGLE_CLIENT_ID", None, is_prod)?,
                    client_secret: get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?,
                    authorize_url: get_env(
                        "GOOGLE_AUTHORIZE_URL",
                        Some("https://accounts.google.com/o/oauth2/v2/auth"),
                        is_prod,
                    )?,
                    token_url: get_env(
                        "GOOGLE_TOKEN_URL",
                        Some("https://oauth2.googleapis.com/token"),
                        is_prod,
                    )?,
                    profile_url: get_env(
                        "GOOGLE_PROFILE_URL",
                        Some("https://openidconnect.googleapis.com/v1/userinfo"),
                        is_prod,
                    )?,
                    redirect_uri: get_env("GOOGLE_REDIRECT_URI", None, is_prod)?,
                    frontend_url: get_env(
                        "GOOGLE_FRONTEND_URL",
                        Some("http://localhost:3000"),
                        is_prod,
                    )?,
                },
                github: ProviderConfig {
                    client_id: get_env("GITHUB_CLIENT_ID", None, is_prod)?,
                    client_secret: get_env("GITHUB_CLIENT_SECRET", None, is_prod)?,
                    authorize_url: get_env(
                        "GITHUB_AUTHORIZE_URL",
                        Some("https://github.com/login/oauth/authorize"),
                        is_prod,
                    )?,
                    token_url: get_env(
                        "GITHUB_TOKEN_URL",
                        Some("https://github.com/login/oauth/access_token"),
                        is_prod,
                    )?,
                    profile_url: get_env(
                        "GITHUB_PROFILE_URL",
                        Some("https://api.github.com/user"),
                        is_prod,
                    )?,
                    redirect_uri: get_env("GITHUB_REDIRECT_URI", None, is_prod)?,
                    frontend_url: get_env(
                        "GITHUB_FRONTEND_URL",
                        Some("http://localhost:3000"),
                        is_prod,
                    )?,
                },
            },
            outbound_http: OutboundHttpConfig {
                timeout_seconds: parse_env("OUTBOUND_HTTP_TIMEOUT_SECONDS", "10", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5", is_prod)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", is_prod)?,
                register_attempts: parse_env("RATE_LIMIT_REGISTER_ATTEMPTS", "3", is_prod)?,
                register_window_seconds: parse_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    "3600",
                    is_prod,
                )?,
                federated_attempts: parse_env("RATE_LIMIT_FEDERATED_ATTEMPTS", "10", is_prod)?,
                federated_window_seconds: parse_env(
                    "RATE_LIMIT_FEDERATED_WINDOW_SECONDS",
                    "900",
                    is_prod,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.secret.len() < 32 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 bytes"
            )));
        }

        if self.jwt.token_ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_TOKEN_TTL_MINUTES must be positive"
            )));
        }

        if self.outbound_http.timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OUTBOUND_HTTP_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::error!("Swagger is publicly accessible in production - consider using 'authenticated' or 'disabled'");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is not valid: {}", key, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "authenticated" => Ok(SwaggerMode::Authenticated),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
