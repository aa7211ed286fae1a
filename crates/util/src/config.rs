use std::{env, fmt, net::SocketAddr};

use super::{server_bind_address, split_list};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://gestularia.db?mode=rwc";
pub const DEFAULT_APEX_DOMAIN: &str = "gestularia.com";
pub const DEFAULT_DEV_HOSTS: &str = "localhost,localhost:3000,localhost:8080,127.0.0.1,127.0.0.1:8080";
pub const DEFAULT_REPORT_TIMEZONE: &str = "UTC";

const DEVELOPMENT_AUTH_SECRET: &str = "gestularia-development-secret";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    /// Bare apex domain storefront subdomains hang off, e.g. `gestularia.com`.
    pub apex_domain: String,
    /// Hosts that are served as-is without tenant rewriting.
    pub dev_hosts: Vec<String>,
    /// HS256 secret shared with the identity provider.
    pub auth_secret: Vec<u8>,
    /// IANA timezone used to bucket orders into calendar days.
    pub report_timezone: String,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let database_url =
            env::var("APP_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let apex_domain = env::var("APP_APEX_DOMAIN")
            .unwrap_or_else(|_| DEFAULT_APEX_DOMAIN.to_string())
            .trim()
            .to_string();
        if apex_domain.is_empty() {
            return Err(ConfigError::EmptyApexDomain);
        }

        let dev_hosts = split_list(
            &env::var("APP_DEV_HOSTS").unwrap_or_else(|_| DEFAULT_DEV_HOSTS.to_string()),
        );

        let auth_secret = match env::var("APP_AUTH_SECRET") {
            Ok(value) if !value.is_empty() => value.into_bytes(),
            _ if environment == Environment::Production => {
                return Err(ConfigError::MissingAuthSecret)
            }
            _ => DEVELOPMENT_AUTH_SECRET.as_bytes().to_vec(),
        };

        let report_timezone = env::var("APP_REPORT_TIMEZONE")
            .unwrap_or_else(|_| DEFAULT_REPORT_TIMEZONE.to_string());

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            apex_domain,
            dev_hosts,
            auth_secret,
            report_timezone,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    EmptyApexDomain,
    MissingAuthSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::EmptyApexDomain => write!(f, "APP_APEX_DOMAIN must not be empty"),
            Self::MissingAuthSecret => {
                write!(f, "APP_AUTH_SECRET is required when APP_ENV=production")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
