use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::auth::MAX_TOKEN_HOURS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub log_level: String,
    pub http: HttpConfig,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub statement_timeout_ms: u64,
    pub run_migrations: bool,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub otp_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub policy_path: PathBuf,
    pub cors_origins: Vec<String>,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS, usually port 587.
    StartTls,
    /// TLS from the first byte, usually port 465.
    Tls,
    /// Unencrypted; local relays and mail catchers only.
    None,
}

impl FromStr for SmtpTls {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpTls::StartTls),
            "tls" | "ssl" => Ok(SmtpTls::Tls),
            "none" | "plain" => Ok(SmtpTls::None),
            _ => Err(()),
        }
    }
}

/// Outbound SMTP relay. Without `smtp_host` mail is only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_pass: Option<String>,
    pub smtp_tls: SmtpTls,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_pass: None,
            smtp_tls: SmtpTls::StartTls,
            from: "no-reply@localhost".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(|name| env::var(name).ok())?;

        config.validate()?;
        Ok(config)
    }

    /// Applies every recognised variable `var` returns on top of a preset.
    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = var("RUST_LOG").or_else(|| var("LOG_LEVEL")) {
            self.log_level = v;
        }

        // HTTP overrides
        if let Some(v) = var("HTTP_PORT") {
            self.http.port = parse_var("HTTP_PORT", &v)?;
        }
        if let Some(v) = var("HTTP_REQUEST_TIMEOUT_SECS") {
            self.http.request_timeout_secs = parse_var("HTTP_REQUEST_TIMEOUT_SECS", &v)?;
        }

        // Filter overrides
        if let Some(v) = var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = Some(parse_var("FILTER_MAX_LIMIT", &v)?);
        }

        // Database overrides
        if let Some(v) = var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Some(v) = var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse_var("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }
        if let Some(v) = var("DATABASE_STATEMENT_TIMEOUT_MS") {
            self.database.statement_timeout_ms = parse_var("DATABASE_STATEMENT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = parse_var("DATABASE_RUN_MIGRATIONS", &v)?;
        }
        if let Some(v) = var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = parse_var("DATABASE_ENABLE_QUERY_LOGGING", &v)?;
        }

        // Cache overrides
        if let Some(v) = var("CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse_var("CACHE_MAX_ENTRIES", &v)?;
        }
        if let Some(v) = var("OTP_TTL_SECS") {
            self.cache.otp_ttl_secs = parse_var("OTP_TTL_SECS", &v)?;
        }

        // Security overrides
        if let Some(v) = var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = parse_var("JWT_EXPIRY_HOURS", &v)?;
        }
        if let Some(v) = var("POLICY_PATH") {
            self.security.policy_path = PathBuf::from(v);
        }
        if let Some(v) = var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        // Mail overrides
        if let Some(v) = var("SMTP_HOST") {
            self.mail.smtp_host = Some(v.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(v) = var("SMTP_PORT") {
            self.mail.smtp_port = parse_var("SMTP_PORT", &v)?;
        }
        if let Some(v) = var("SMTP_USER") {
            self.mail.smtp_user = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = var("SMTP_PASS") {
            self.mail.smtp_pass = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = var("SMTP_TLS") {
            self.mail.smtp_tls = parse_var("SMTP_TLS", &v)?;
        }
        if let Some(v) = var("MAIL_FROM") {
            self.mail.from = v;
        }

        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if !(1..=MAX_TOKEN_HOURS).contains(&self.security.jwt_expiry_hours) {
            return Err(ConfigError::Invalid {
                name: "JWT_EXPIRY_HOURS",
                value: self.security.jwt_expiry_hours.to_string(),
            });
        }
        if let Some(limit) = self.filter.max_limit.filter(|n| *n <= 0) {
            return Err(ConfigError::Invalid { name: "FILTER_MAX_LIMIT", value: limit.to_string() });
        }
        if self.mail.smtp_host.is_some() {
            if self.mail.smtp_port == 0 {
                return Err(ConfigError::Invalid { name: "SMTP_PORT", value: "0".to_string() });
            }
            if self.mail.smtp_user.is_some() && self.mail.smtp_pass.is_none() {
                return Err(ConfigError::Missing("SMTP_PASS"));
            }
        }
        Ok(())
    }

    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.otp_ttl_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.database.statement_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            log_level: "debug".to_string(),
            http: HttpConfig { port: 8080, request_timeout_secs: 30 },
            filter: FilterConfig { max_limit: Some(100) },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                statement_timeout_ms: 5_000,
                run_migrations: true,
                enable_query_logging: true,
            },
            cache: CacheConfig { max_entries: 10_000, otp_ttl_secs: 300 },
            security: SecurityConfig {
                // dev-only fallback; staging and production must set JWT_SECRET
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24,
                policy_path: PathBuf::from("config/policy.yaml"),
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            mail: MailConfig { smtp_port: 1025, smtp_tls: SmtpTls::None, ..Default::default() },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            log_level: "info".to_string(),
            http: HttpConfig { port: 8080, request_timeout_secs: 15 },
            filter: FilterConfig { max_limit: Some(100) },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                statement_timeout_ms: 5_000,
                run_migrations: true,
                enable_query_logging: true,
            },
            cache: CacheConfig { max_entries: 50_000, otp_ttl_secs: 300 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                policy_path: PathBuf::from("config/policy.yaml"),
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            mail: MailConfig { from: "no-reply@staging.example.com".to_string(), ..Default::default() },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            log_level: "info".to_string(),
            http: HttpConfig { port: 8080, request_timeout_secs: 10 },
            filter: FilterConfig { max_limit: Some(100) },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                statement_timeout_ms: 3_000,
                run_migrations: false,
                enable_query_logging: false,
            },
            cache: CacheConfig { max_entries: 100_000, otp_ttl_secs: 300 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                policy_path: PathBuf::from("config/policy.yaml"),
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            mail: MailConfig { from: "no-reply@example.com".to_string(), ..Default::default() },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid { name, value: value.to_string() })
}
