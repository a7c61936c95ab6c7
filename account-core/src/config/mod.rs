use crate::store::postgres::DatabaseConfig;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(String),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
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

/// Top-level configuration for the account layer.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    /// Base URL embedded into confirmation / reset links in outbound mail.
    pub public_base_url: String,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub lockout: LockoutConfig,
    pub challenge: ChallengeConfig,
    pub tokens: TokenConfig,
    pub password_policy: PasswordPolicy,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Failed credential checks tolerated before the window opens.
    pub max_failed_attempts: u32,
    pub lockout_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    pub code_length: usize,
    pub session_ttl_minutes: i64,
    /// Wrong codes tolerated on one pending session before it is
    /// invalidated and the account locked out.
    pub max_attempts: u32,
    pub remember_device_days: i64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub reset_ttl_minutes: i64,
    pub confirmation_ttl_hours: i64,
    pub phone_code_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str.parse().map_err(|e: String| ConfigError::Invalid {
            key: "ENVIRONMENT".to_string(),
            message: e,
        })?;

        let is_prod = environment == Environment::Prod;

        let config = CoreConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("account-core"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            public_base_url: get_env("PUBLIC_BASE_URL", Some("http://localhost:3000"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", Some("postgres://localhost/accounts"), is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                port: parse_env("SMTP_PORT", "587", is_prod)?,
                username: get_env("SMTP_USERNAME", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_address: get_env("SMTP_FROM", Some("no-reply@localhost"), is_prod)?,
            },
            lockout: LockoutConfig {
                max_failed_attempts: parse_env("LOCKOUT_MAX_FAILED_ATTEMPTS", "5", is_prod)?,
                lockout_minutes: parse_env("LOCKOUT_MINUTES", "15", is_prod)?,
            },
            challenge: ChallengeConfig {
                code_length: parse_env("CHALLENGE_CODE_LENGTH", "6", is_prod)?,
                session_ttl_minutes: parse_env("CHALLENGE_SESSION_TTL_MINUTES", "5", is_prod)?,
                max_attempts: parse_env("CHALLENGE_MAX_ATTEMPTS", "3", is_prod)?,
                remember_device_days: parse_env("CHALLENGE_REMEMBER_DEVICE_DAYS", "30", is_prod)?,
            },
            tokens: TokenConfig {
                reset_ttl_minutes: parse_env("TOKEN_RESET_TTL_MINUTES", "60", is_prod)?,
                confirmation_ttl_hours: parse_env("TOKEN_CONFIRMATION_TTL_HOURS", "24", is_prod)?,
                phone_code_ttl_minutes: parse_env("TOKEN_PHONE_CODE_TTL_MINUTES", "10", is_prod)?,
            },
            password_policy: PasswordPolicy {
                min_length: parse_env("PASSWORD_MIN_LENGTH", "8", is_prod)?,
                require_digit: parse_env("PASSWORD_REQUIRE_DIGIT", "true", is_prod)?,
                require_lowercase: parse_env("PASSWORD_REQUIRE_LOWERCASE", "true", is_prod)?,
                require_uppercase: parse_env("PASSWORD_REQUIRE_UPPERCASE", "true", is_prod)?,
                require_non_alphanumeric: parse_env("PASSWORD_REQUIRE_SYMBOL", "true", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lockout.max_failed_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "LOCKOUT_MAX_FAILED_ATTEMPTS".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.challenge.code_length < 4 {
            return Err(ConfigError::Invalid {
                key: "CHALLENGE_CODE_LENGTH".to_string(),
                message: "codes shorter than 4 digits are trivially guessable".to_string(),
            });
        }

        if self.challenge.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "CHALLENGE_MAX_ATTEMPTS".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.password_policy.min_length < 6 {
            return Err(ConfigError::Invalid {
                key: "PASSWORD_MIN_LENGTH".to_string(),
                message: "must be at least 6".to_string(),
            });
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(ConfigError::Missing(format!("{} (required in production)", key)))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(ConfigError::Missing(key.to_string()))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_in_dev() {
        dotenvy::dotenv().ok();

        // Dev environment falls back to defaults for everything.
        let config = CoreConfig::from_env().expect("dev config should load from defaults");
        assert_eq!(config.lockout.max_failed_attempts, 5);
        assert_eq!(config.challenge.code_length, 6);
        assert!(config.password_policy.require_digit);
    }
}
