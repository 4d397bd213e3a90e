//! Configuration management
//!
//! This module handles loading and parsing configuration for Postguard.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

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
    /// Provisioning of demo data
    #[serde(default)]
    pub seed: SeedConfig,
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
    /// CORS allowed origin (the client app)
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
    8000
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
    "data/postguard.db".to_string()
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

/// Longest accepted session lifetime, about a century
pub const MAX_SESSION_TTL_DAYS: i64 = 36_500;

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days. `None` keeps sessions alive until logout.
    #[serde(default)]
    pub session_ttl_days: Option<i64>,
    /// Failed logins allowed per email inside the lockout window
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: usize,
    /// Lockout window in minutes
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: None,
            max_login_attempts: default_max_login_attempts(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> Option<chrono::Duration> {
        self.session_ttl_days.and_then(chrono::Duration::try_days)
    }
}

fn default_max_login_attempts() -> usize {
    5
}

fn default_lockout_minutes() -> i64 {
    15
}

/// Demo data provisioning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Create the demo users and sample posts on startup
    #[serde(default)]
    pub demo_data: bool,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - POSTGUARD_SERVER_HOST
    /// - POSTGUARD_SERVER_PORT
    /// - POSTGUARD_SERVER_CORS_ORIGIN
    /// - POSTGUARD_DATABASE_DRIVER
    /// - POSTGUARD_DATABASE_URL
    /// - POSTGUARD_AUTH_SESSION_TTL_DAYS
    /// - POSTGUARD_AUTH_MAX_LOGIN_ATTEMPTS
    /// - POSTGUARD_AUTH_LOCKOUT_MINUTES
    /// - POSTGUARD_SEED_DEMO_DATA
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot work at runtime
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(days) = self.auth.session_ttl_days {
            if days <= 0 || days > MAX_SESSION_TTL_DAYS {
                return Err(ConfigError::ValidationError(format!(
                    "auth.session_ttl_days must be between 1 and {}, got {}",
                    MAX_SESSION_TTL_DAYS, days
                )));
            }
        }
        if self.auth.max_login_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "auth.max_login_attempts must be at least 1".to_string(),
            ));
        }
        if self.auth.lockout_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.lockout_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("POSTGUARD_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("POSTGUARD_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("POSTGUARD_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("POSTGUARD_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("POSTGUARD_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("POSTGUARD_AUTH_SESSION_TTL_DAYS") {
            if ttl.trim().is_empty() || ttl.eq_ignore_ascii_case("none") {
                self.auth.session_ttl_days = None;
            } else if let Ok(days) = ttl.parse::<i64>() {
                self.auth.session_ttl_days = Some(days);
            }
        }
        if let Ok(attempts) = std::env::var("POSTGUARD_AUTH_MAX_LOGIN_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse::<usize>() {
                self.auth.max_login_attempts = attempts;
            }
        }
        if let Ok(minutes) = std::env::var("POSTGUARD_AUTH_LOCKOUT_MINUTES") {
            if let Ok(minutes) = minutes.parse::<i64>() {
                self.auth.lockout_minutes = minutes;
            }
        }

        if let Ok(seed) = std::env::var("POSTGUARD_SEED_DEMO_DATA") {
            match seed.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.seed.demo_data = true,
                "0" | "false" | "no" => self.seed.demo_data = false,
                _ => {}
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
