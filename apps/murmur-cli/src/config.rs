//! Engine configuration loaded from environment variables.
//!
//! Loading is fail-fast: required variables must be present and valid
//! before any store is contacted. The environment name is resolved to a
//! workflow dataset once, here, and passed down explicitly.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use murmur_store::http::HttpStoreConfig;
use murmur_store::postgres::PgStoreConfig;
use murmur_store::RetryPolicy;
use thiserror::Error;

use crate::logging::LogFormat;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Deployment environment, mapped to a workflow dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MurmurEnv {
    Development,
    Staging,
    Production,
}

impl MurmurEnv {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Workflow dataset used when `WORKFLOW_DATASET` is not set.
    #[must_use]
    pub fn default_dataset(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for MurmurEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "expected development, staging or production, got '{other}'"
            )),
        }
    }
}

/// Everything the CLI needs to build the engine.
#[derive(Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub workflow_api_url: String,
    pub workflow_api_token: String,
    pub environment: MurmurEnv,
    pub workflow_dataset: String,
    /// Per-call store timeout.
    pub store_timeout: Duration,
    pub retry: RetryPolicy,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("database_url", &"[REDACTED]")
            .field("database_max_connections", &self.database_max_connections)
            .field("workflow_api_url", &self.workflow_api_url)
            .field("workflow_api_token", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("workflow_dataset", &self.workflow_dataset)
            .field("store_timeout", &self.store_timeout)
            .field("retry", &self.retry)
            .field("log_filter", &self.log_filter)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl EngineConfig {
    /// Load from the process environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(var.to_string()))
        };

        let database_url = required("DATABASE_URL")?;
        let workflow_api_url = required("WORKFLOW_API_URL")?;
        let workflow_api_token = required("WORKFLOW_API_TOKEN")?;

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;
        if database_max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "must be at least 1"));
        }

        let environment = match lookup("MURMUR_ENV") {
            Some(value) => value
                .parse::<MurmurEnv>()
                .map_err(|message| invalid("MURMUR_ENV", &message))?,
            None => MurmurEnv::Development,
        };
        let workflow_dataset = lookup("WORKFLOW_DATASET")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| environment.default_dataset().to_string());

        let timeout_secs = parse_or(&lookup, "STORE_TIMEOUT_SECS", 10u64)?;
        if timeout_secs == 0 {
            return Err(invalid("STORE_TIMEOUT_SECS", "must be at least 1"));
        }
        let max_retries = parse_or(&lookup, "STORE_MAX_RETRIES", 2u32)?;
        let base_delay_ms = parse_or(&lookup, "STORE_RETRY_BASE_DELAY_MS", 200u64)?;

        let log_filter = lookup("MURMUR_LOG").unwrap_or_else(|| "info".to_string());
        let log_format = match lookup("MURMUR_LOG_FORMAT") {
            Some(value) => value
                .parse::<LogFormat>()
                .map_err(|message| invalid("MURMUR_LOG_FORMAT", &message))?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            workflow_api_url,
            workflow_api_token,
            environment,
            workflow_dataset,
            store_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy::new(max_retries, Duration::from_millis(base_delay_ms)),
            log_filter,
            log_format,
        })
    }

    #[must_use]
    pub fn primary_store_config(&self) -> PgStoreConfig {
        PgStoreConfig {
            database_url: self.database_url.clone(),
            max_connections: self.database_max_connections,
            timeout: self.store_timeout,
        }
    }

    #[must_use]
    pub fn workflow_store_config(&self) -> HttpStoreConfig {
        HttpStoreConfig {
            base_url: self.workflow_api_url.clone(),
            token: self.workflow_api_token.clone(),
            dataset: self.workflow_dataset.clone(),
            timeout: self.store_timeout,
        }
    }
}

fn invalid(var: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        message: message.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        Some(value) => value.trim().parse::<T>().map_err(|e| invalid(var, &e.to_string())),
        None => Ok(default),
    }
}
