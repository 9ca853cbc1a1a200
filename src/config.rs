//! # Application Configuration
//!
//! TOML configuration with environment overrides for secrets. All
//! values are validated at startup; an invalid configuration refuses
//! to boot rather than degrading silently.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::auth::email::SmtpConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Invalid config TOML: {0}")]
    Parse(String),

    #[error("Invalid configuration for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL, used in emailed links
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Enables HSTS and the Secure cookie flag
    #[serde(default)]
    pub production: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            production: false,
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session token signing secret. Overridable via
    /// `CIVICWATCH_JWT_SECRET`.
    #[serde(default)]
    pub jwt_secret: String,
    /// Session token lifetime in seconds
    #[serde(default = "default_token_max_age")]
    pub token_max_age_secs: i64,
    /// Login rate limit window in seconds
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
    /// Allowed login attempts per window
    #[serde(default = "default_rate_limit_attempts")]
    pub rate_limit_max_attempts: usize,
    /// Consecutive failures before an account locks
    #[serde(default = "default_max_failed_logins")]
    pub max_failed_logins: u32,
    /// Account lockout duration in minutes
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
}

fn default_token_max_age() -> i64 {
    86400
}
fn default_rate_limit_window() -> u64 {
    60
}
fn default_rate_limit_attempts() -> usize {
    5
}
fn default_max_failed_logins() -> u32 {
    5
}
fn default_lockout_minutes() -> i64 {
    15
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_max_age_secs: default_token_max_age(),
            rate_limit_window_secs: default_rate_limit_window(),
            rate_limit_max_attempts: default_rate_limit_attempts(),
            max_failed_logins: default_max_failed_logins(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Optional SMTP settings; without them, no emails are sent and
    /// verification tokens only appear in storage
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file, apply environment
    /// overrides, and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        let mut config: AppConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Secrets come from the environment when present, so they never
    /// have to live in the config file
    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("CIVICWATCH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(smtp) = &mut self.smtp {
            if let Ok(password) = std::env::var("CIVICWATCH_SMTP_PASSWORD") {
                smtp.password = password;
            }
        }
    }

    /// Validate all fields. Collecting failures one at a time keeps
    /// the messages actionable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid(
                "server.port",
                "Port must be between 1 and 65535",
            ));
        }
        if !self.server.public_url.starts_with("http://")
            && !self.server.public_url.starts_with("https://")
        {
            return Err(ConfigError::invalid(
                "server.public_url",
                "Must start with http:// or https://",
            ));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(ConfigError::invalid(
                "auth.jwt_secret",
                "Must be at least 32 characters (set CIVICWATCH_JWT_SECRET)",
            ));
        }
        if self.auth.token_max_age_secs <= 0 {
            return Err(ConfigError::invalid(
                "auth.token_max_age_secs",
                "Must be greater than 0",
            ));
        }
        if self.auth.rate_limit_window_secs == 0 {
            return Err(ConfigError::invalid(
                "auth.rate_limit_window_secs",
                "Must be greater than 0",
            ));
        }
        if self.auth.rate_limit_max_attempts == 0 {
            return Err(ConfigError::invalid(
                "auth.rate_limit_max_attempts",
                "Must be greater than 0",
            ));
        }
        if self.auth.lockout_minutes <= 0 {
            return Err(ConfigError::invalid(
                "auth.lockout_minutes",
                "Must be greater than 0",
            ));
        }

        if let Some(smtp) = &self.smtp {
            if smtp.host.is_empty() {
                return Err(ConfigError::invalid("smtp.host", "Must not be empty"));
            }
            if smtp.port == 0 {
                return Err(ConfigError::invalid(
                    "smtp.port",
                    "Port must be between 1 and 65535",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("civicwatch.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_minimal_config() {
        let (_dir, path) = write_config(
            r#"
[auth]
jwt_secret = "0123456789abcdef0123456789abcdef"
"#,
        );

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_max_age_secs, 86400);
        assert_eq!(config.auth.rate_limit_max_attempts, 5);
        assert!(config.smtp.is_none());
        assert!(!config.server.production);
    }

    #[test]
    fn test_short_secret_rejected() {
        let (_dir, path) = write_config(
            r#"
[auth]
jwt_secret = "too-short"
"#,
        );

        let result = AppConfig::load(&path);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "auth.jwt_secret",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let (_dir, path) = write_config("not [valid toml");
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Read(_))));
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = AppConfig {
            server: ServerConfig {
                port: 0,
                ..ServerConfig::default()
            },
            auth: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                ..AuthConfig::default()
            },
            smtp: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_smtp_section_parsed() {
        let (_dir, path) = write_config(
            r#"
[auth]
jwt_secret = "0123456789abcdef0123456789abcdef"

[smtp]
host = "smtp.example.com"
port = 587
username = "mailer"
password = "hunter2"
from_address = "no-reply@example.com"
from_name = "CivicWatch"
base_url = "https://civicwatch.example"
"#,
        );

        let config = AppConfig::load(&path).unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.timeout_secs, 10);
    }
}
