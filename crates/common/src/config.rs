//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Token signing configuration.
    pub auth: AuthConfig,
    /// Registration flow configuration.
    #[serde(default)]
    pub registration: RegistrationConfig,
    /// SMTP configuration. Without it, verification emails are only logged.
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Access token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign access tokens.
    pub jwt_secret: String,
    /// Access token lifetime.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

/// Registration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Hold new accounts as pending until the email address is verified.
    #[serde(default)]
    pub require_email_verification: bool,
    /// Lifetime of a verification token.
    #[serde(default = "default_verification_ttl_hours")]
    pub verification_token_ttl_hours: i64,
    /// Base URL of the web frontend, used to build verification links.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            require_email_verification: false,
            verification_token_ttl_hours: default_verification_ttl_hours(),
            frontend_url: default_frontend_url(),
        }
    }
}

/// SMTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_token_ttl_minutes() -> i64 {
    30
}

const fn default_verification_ttl_hours() -> i64 {
    24
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Democrasite".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `DEMOCRASITE_ENV`)
    /// 3. Environment variables with `DEMOCRASITE_` prefix
    ///
    /// A `.env` file in the working directory, if present, is loaded into the
    /// environment first.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("DEMOCRASITE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DEMOCRASITE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("DEMOCRASITE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
