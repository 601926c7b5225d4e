use crate::constants::{
    DEFAULT_LOG_FILTER,
    FACEBOOK_API_VERSION,
    FACEBOOK_BASE_URL,
    FB_REQUEST_TIMEOUT_SECS,
    WORKER_INTERVAL_SECS,
};
use dotenv::dotenv;
use std::env;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_tls_verify: bool,
    pub encryption_key: String,
    pub graph_base_url: String,
    pub graph_api_version: String,
    pub graph_timeout_secs: u64,
    pub worker_interval_secs: u64,
    pub dry_run: bool,
    pub run_once: bool,
    pub rust_log: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    MissingEnv(String),
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Invalid Graph API URL: {0}")]
    InvalidGraphUrl(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;

        // Validate the URL format
        Url::parse(&database_url)
            .map_err(|e| ConfigError::InvalidDatabaseUrl(e.to_string()))?;

        let encryption_key = required("ENCRYPTION_KEY")?;
        if encryption_key.len() != 64 || hex::decode(&encryption_key).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "ENCRYPTION_KEY".to_string(),
                value: "<expected 64 hex characters>".to_string(),
            });
        }

        let graph_base_url = optional("GRAPH_API_BASE_URL")
            .unwrap_or_else(|| FACEBOOK_BASE_URL.to_string());
        Url::parse(&graph_base_url)
            .map_err(|e| ConfigError::InvalidGraphUrl(e.to_string()))?;

        let graph_api_version = optional("GRAPH_API_VERSION")
            .unwrap_or_else(|| FACEBOOK_API_VERSION.to_string());

        let graph_timeout_secs = seconds("GRAPH_TIMEOUT_SECS", FB_REQUEST_TIMEOUT_SECS)?;
        let worker_interval_secs = seconds("WORKER_INTERVAL_SECS", WORKER_INTERVAL_SECS)?;

        Ok(Self {
            database_url,
            database_tls_verify: flag("DATABASE_TLS_VERIFY", true)?,
            encryption_key,
            graph_base_url: graph_base_url.trim_end_matches('/').to_string(),
            graph_api_version,
            graph_timeout_secs,
            worker_interval_secs,
            dry_run: flag("AUTOMATION_DRY_RUN", false)?,
            run_once: flag("RUN_ONCE", false)?,
            rust_log: optional("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    optional(name).ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn seconds(name: &str, default: u64) -> Result<u64, ConfigError> {
    match optional(name) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }),
        },
        None => Ok(default),
    }
}

fn flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    match optional(name) {
        Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
