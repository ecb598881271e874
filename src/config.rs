// Application configuration, read from environment variables.
//
// `.env` is loaded by main before this runs, so values can come from either.
// Optional integrations (Gemini, SMTP) are switched off by leaving their
// keys unset rather than by a separate flag.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::infra::ai::gemini_moderation_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/feedback.db";
const DEFAULT_MODERATION_TIMEOUT_MS: u64 = 5000;
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// How the process was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
    /// No store is opened and no port is bound
    Test,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(RunMode::Development),
            "production" | "prod" => Ok(RunMode::Production),
            "test" => Ok(RunMode::Test),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// `None` runs moderation with the rule filter only
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS instead of STARTTLS
    pub secure: bool,
    pub user: String,
    pub password: String,
    /// Recipient of new-feedback notifications
    pub notify_to: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub mode: RunMode,
    pub database_url: String,
    pub moderation: ModerationConfig,
    /// `None` when `EMAIL_HOST` is unset
    pub email: Option<EmailConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let moderation = ModerationConfig {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_millis(parse_or(
                "MODERATION_TIMEOUT_MS",
                get("MODERATION_TIMEOUT_MS"),
                DEFAULT_MODERATION_TIMEOUT_MS,
            )?),
        };

        let email = match get("EMAIL_HOST") {
            Some(host) => {
                let user = get("EMAIL_USER").unwrap_or_default();
                Some(EmailConfig {
                    host,
                    port: parse_or("EMAIL_PORT", get("EMAIL_PORT"), DEFAULT_SMTP_PORT)?,
                    secure: get("EMAIL_SECURE")
                        .map(|v| v.eq_ignore_ascii_case("true"))
                        .unwrap_or(false),
                    notify_to: get("EMAIL_NOTIFY_TO").unwrap_or_else(|| user.clone()),
                    password: get("EMAIL_PASS").unwrap_or_default(),
                    user,
                })
            }
            None => None,
        };

        Ok(Self {
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            mode: parse_or("APP_ENV", get("APP_ENV"), RunMode::Development)?,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            moderation,
            email,
        })
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.mode, RunMode::Development);
        assert_eq!(config.database_url, "sqlite://data/feedback.db");
        assert!(config.moderation.gemini_api_key.is_none());
        assert_eq!(config.moderation.gemini_model, "gemini-2.5-flash");
        assert_eq!(config.moderation.timeout, Duration::from_millis(5000));
        assert!(config.email.is_none());
    }

    #[test]
    fn test_blank_api_key_means_rules_only() {
        let config = load(&[("GEMINI_API_KEY", "   ")]).unwrap();
        assert!(config.moderation.gemini_api_key.is_none());

        let config = load(&[("GEMINI_API_KEY", "abc123")]).unwrap();
        assert_eq!(config.moderation.gemini_api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_timeout_override() {
        let config = load(&[("MODERATION_TIMEOUT_MS", "2000")]).unwrap();
        assert_eq!(config.moderation.timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = load(&[("MODERATION_TIMEOUT_MS", "-1")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MODERATION_TIMEOUT_MS",
                ..
            }
        ));
    }

    #[test]
    fn test_run_mode() {
        assert_eq!(load(&[("APP_ENV", "TEST")]).unwrap().mode, RunMode::Test);
        assert_eq!(
            load(&[("APP_ENV", "production")]).unwrap().mode,
            RunMode::Production
        );
        assert!(load(&[("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn test_email_config() {
        let config = load(&[
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_PORT", "465"),
            ("EMAIL_SECURE", "TRUE"),
            ("EMAIL_USER", "bot@example.com"),
            ("EMAIL_PASS", "hunter2"),
        ])
        .unwrap();

        let email = config.email.unwrap();
        assert_eq!(email.host, "smtp.example.com");
        assert_eq!(email.port, 465);
        assert!(email.secure);
        assert_eq!(email.notify_to, "bot@example.com");

        let config = load(&[
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_SECURE", "yes"),
            ("EMAIL_NOTIFY_TO", "owner@example.com"),
        ])
        .unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.port, 587);
        assert!(!email.secure);
        assert_eq!(email.notify_to, "owner@example.com");
    }
}
