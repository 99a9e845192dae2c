use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    /// Raw comma-separated administrator emails; parsed once into the allow-list.
    pub admin_emails: String,
    pub session: SessionConfig,
    pub otp: OtpConfig,
    pub smtp: SmtpConfig,
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
pub struct SessionConfig {
    pub secret: Secret<String>,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
    /// 0 disables the background sweeper.
    pub purge_interval_seconds: u64,
    pub dependency_timeout_ms: u64,
    /// Every code request takes at least this long, whatever the outcome.
    pub min_response_ms: u64,
}

impl OtpConfig {
    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.dependency_timeout_ms)
    }

    pub fn min_response(&self) -> Duration {
        Duration::from_millis(self.min_response_ms)
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 600,
            purge_interval_seconds: 300,
            dependency_timeout_ms: 5_000,
            min_response_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
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
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub otp_request_attempts: u32,
    pub otp_request_window_seconds: u64,
    pub otp_verify_attempts: u32,
    pub otp_verify_window_seconds: u64,
    /// Verification attempts per email, whichever IP they come from.
    pub otp_verify_email_attempts: u32,
    pub otp_verify_email_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = ServiceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("brand-auth-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: get_parsed("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            admin_emails: get_env("ADMIN_EMAILS", Some(""), is_prod)?,
            session: SessionConfig {
                secret: Secret::new(get_env("SESSION_SECRET", None, is_prod)?),
                ttl_minutes: get_parsed("SESSION_TTL_MINUTES", "720", is_prod)?,
            },
            otp: OtpConfig {
                ttl_seconds: get_parsed("OTP_TTL_SECONDS", "600", is_prod)?,
                purge_interval_seconds: get_parsed("OTP_PURGE_INTERVAL_SECONDS", "300", is_prod)?,
                dependency_timeout_ms: get_parsed("DEPENDENCY_TIMEOUT_MS", "5000", is_prod)?,
                min_response_ms: get_parsed("OTP_MIN_RESPONSE_MS", "5000", is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: get_parsed("SMTP_PORT", "587", is_prod)?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: Secret::new(get_env("SMTP_PASSWORD", None, is_prod)?),
                from_email: get_env("SMTP_FROM_EMAIL", None, is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Brand Login"), is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                otp_request_attempts: get_parsed("RATE_LIMIT_OTP_REQUEST_ATTEMPTS", "5", is_prod)?,
                otp_request_window_seconds: get_parsed(
                    "RATE_LIMIT_OTP_REQUEST_WINDOW_SECONDS",
                    "900",
                    is_prod,
                )?,
                otp_verify_attempts: get_parsed("RATE_LIMIT_OTP_VERIFY_ATTEMPTS", "10", is_prod)?,
                otp_verify_window_seconds: get_parsed(
                    "RATE_LIMIT_OTP_VERIFY_WINDOW_SECONDS",
                    "900",
                    is_prod,
                )?,
                otp_verify_email_attempts: get_parsed(
                    "RATE_LIMIT_OTP_VERIFY_EMAIL_ATTEMPTS",
                    "5",
                    is_prod,
                )?,
                otp_verify_email_window_seconds: get_parsed(
                    "RATE_LIMIT_OTP_VERIFY_EMAIL_WINDOW_SECONDS",
                    "900",
                    is_prod,
                )?,
                global_ip_limit: get_parsed("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: get_parsed(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.otp.ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OTP_TTL_SECONDS must be positive"
            )));
        }

        if self.otp.dependency_timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEPENDENCY_TIMEOUT_MS must be positive"
            )));
        }

        if self.otp.min_response_ms < self.otp.dependency_timeout_ms {
            tracing::warn!(
                min_response_ms = self.otp.min_response_ms,
                dependency_timeout_ms = self.otp.dependency_timeout_ms,
                "OTP_MIN_RESPONSE_MS is below the email timeout; slow dispatches can reveal registered brands"
            );
        }

        if self.session.ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_MINUTES must be positive"
            )));
        }

        if self.session.secret.expose_secret().trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_SECRET must not be empty"
            )));
        }

        if self.admin_emails.split(',').all(|e| e.trim().is_empty()) {
            tracing::warn!("ADMIN_EMAILS is empty; every admin route will reject");
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger is publicly accessible in production");
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
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
    })
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
