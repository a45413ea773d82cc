//! Configuration management
//!
//! Loads service configuration from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The only
//! value without a safe default is the token signing secret, which must be
//! overridden outside local development.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/revise-auth.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    /// Session / token lifetime in days.
    /// The same window governs the signed token and the session row.
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    /// Interval in seconds between expired-session sweeps (0 disables)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Identity-provider userinfo endpoint for OAuth token exchange
    #[serde(default = "default_oauth_userinfo_url")]
    pub oauth_userinfo_url: String,
    /// Redirect target returned after login when the client sends none
    #[serde(default = "default_redirect_url")]
    pub default_redirect_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            session_ttl_days: default_session_ttl_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            oauth_userinfo_url: default_oauth_userinfo_url(),
            default_redirect_url: default_redirect_url(),
        }
    }
}

fn default_token_secret() -> String {
    // Development fallback. main() logs a warning when this is still in use.
    "insecure-dev-secret".to_string()
}

fn default_session_ttl_days() -> i64 {
    7
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_oauth_userinfo_url() -> String {
    "https://accounts.google.com/oauth2/v3/userinfo".to_string()
}

fn default_redirect_url() -> String {
    "/dashboard".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    FileParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid value for {var}: {message}")]
    InvalidEnv { var: String, message: String },
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
                    path: path.display().to_string(),
                    source,
                })?;
            serde_yaml::from_str(&content).map_err(|source| ConfigError::FileParse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `REVISE_AUTH_*` environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("REVISE_AUTH_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("REVISE_AUTH_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "REVISE_AUTH_PORT".to_string(),
                message: format!("'{}' is not a valid port", port),
            })?;
        }
        if let Ok(origin) = std::env::var("REVISE_AUTH_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Ok(driver) = std::env::var("REVISE_AUTH_DB_DRIVER") {
            self.database.driver = match driver.to_lowercase().as_str() {
                "sqlite" => DatabaseDriver::Sqlite,
                "mysql" => DatabaseDriver::Mysql,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        var: "REVISE_AUTH_DB_DRIVER".to_string(),
                        message: format!("unknown driver '{}'", other),
                    })
                }
            };
        }
        if let Ok(url) = std::env::var("REVISE_AUTH_DB_URL") {
            self.database.url = url;
        }
        if let Ok(secret) = std::env::var("REVISE_AUTH_TOKEN_SECRET") {
            self.auth.token_secret = secret;
        }
        if let Ok(ttl) = std::env::var("REVISE_AUTH_SESSION_TTL_DAYS") {
            self.auth.session_ttl_days = ttl.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "REVISE_AUTH_SESSION_TTL_DAYS".to_string(),
                message: format!("'{}' is not a valid day count", ttl),
            })?;
        }
        if let Ok(url) = std::env::var("REVISE_AUTH_OAUTH_USERINFO_URL") {
            self.auth.oauth_userinfo_url = url;
        }
        Ok(())
    }

    /// Whether the signing secret is still the development fallback.
    pub fn uses_default_secret(&self) -> bool {
        self.auth.token_secret == default_token_secret()
    }
}
