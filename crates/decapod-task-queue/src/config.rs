//! Typed configuration surface for the task queue.
//!
//! Loaded from environment variables with a `TASKQ_` prefix and/or a TOML
//! file, following this lineage's layered-config convention: start from
//! defaults, overlay the file (if present), overlay environment variables
//! (highest priority, so operators can always override a checked-in file
//! without editing it).

use std::collections::HashMap;
use std::time::Duration;

use decapod_task_core::RetryPolicy;
use serde::Deserialize;

use crate::error::ConfigError;

/// `db.*` — connection and pooling for the durable store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// `db.uri`.
    pub uri: String,
    /// `db.connect` — eager vs lazy connection.
    pub connect: bool,
    /// `db.connect_timeout`, milliseconds.
    pub connect_timeout_ms: u64,
    /// `db.socket_timeout`, milliseconds.
    pub socket_timeout_ms: u64,
    /// `db.pool_size`.
    pub pool_size: u32,
    /// `db.tls_verify` — defaults to `true`. See DESIGN.md for why this
    /// deviates from the legacy "ssl=true implies unverified" behavior.
    pub tls_verify: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            uri: "postgres://localhost:5432/decapod_tasks".to_string(),
            connect: true,
            connect_timeout_ms: 5_000,
            socket_timeout_ms: 30_000,
            pool_size: 10,
            tls_verify: true,
        }
    }
}

/// `cron.*` — terminal-task retention.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CronConfig {
    /// `cron.clean_finished_tasks_after_seconds`.
    pub clean_finished_tasks_after_seconds: i64,
}

impl Default for CronConfig {
    fn default() -> Self {
        CronConfig {
            clean_finished_tasks_after_seconds: 86_400,
        }
    }
}

/// `retry.*` — the bounded-retry policy wrapping every store operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 50,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: cfg.max_attempts,
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            backoff_multiplier: cfg.backoff_multiplier,
            jitter: cfg.jitter,
        }
    }
}

/// Top-level configuration, assembled from `db`, `cron`, and `retry`
/// sections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub cron: CronConfig,
    pub retry: RetryConfig,
}

impl Config {
    /// Load defaults, overlay an optional TOML file, then overlay
    /// `TASKQ_`-prefixed environment variables.
    pub fn load(toml_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let mut config = match toml_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::File(path.display().to_string(), e.to_string()))?;
                toml::from_str(&text).map_err(|e| ConfigError::Toml(e.to_string()))?
            }
            None => Config::default(),
        };
        config.apply_env(&std::env::vars().collect())?;
        Ok(config)
    }

    /// Overlay `TASKQ_`-prefixed environment variables, e.g. `TASKQ_DB_URI`,
    /// `TASKQ_CRON_CLEAN_FINISHED_TASKS_AFTER_SECONDS`, `TASKQ_RETRY_MAX_ATTEMPTS`.
    fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        const PREFIX: &str = "TASKQ_";
        let get = |key: &str| vars.get(&format!("{PREFIX}{key}")).cloned();
        let parse = |key: &str, value: &str| -> Result<i64, ConfigError> {
            value
                .parse()
                .map_err(|_| ConfigError::Env(key.to_string(), value.to_string()))
        };

        if let Some(v) = get("DB_URI") {
            self.db.uri = v;
        }
        if let Some(v) = get("DB_CONNECT") {
            self.db.connect = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = get("DB_CONNECT_TIMEOUT_MS") {
            self.db.connect_timeout_ms = parse("DB_CONNECT_TIMEOUT_MS", &v)? as u64;
        }
        if let Some(v) = get("DB_SOCKET_TIMEOUT_MS") {
            self.db.socket_timeout_ms = parse("DB_SOCKET_TIMEOUT_MS", &v)? as u64;
        }
        if let Some(v) = get("DB_POOL_SIZE") {
            self.db.pool_size = parse("DB_POOL_SIZE", &v)? as u32;
        }
        if let Some(v) = get("DB_TLS_VERIFY") {
            self.db.tls_verify = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = get("CRON_CLEAN_FINISHED_TASKS_AFTER_SECONDS") {
            self.cron.clean_finished_tasks_after_seconds =
                parse("CRON_CLEAN_FINISHED_TASKS_AFTER_SECONDS", &v)?;
        }
        if let Some(v) = get("RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse("RETRY_MAX_ATTEMPTS", &v)? as u32;
        }
        if let Some(v) = get("RETRY_INITIAL_DELAY_MS") {
            self.retry.initial_delay_ms = parse("RETRY_INITIAL_DELAY_MS", &v)? as u64;
        }
        if let Some(v) = get("RETRY_MAX_DELAY_MS") {
            self.retry.max_delay_ms = parse("RETRY_MAX_DELAY_MS", &v)? as u64;
        }
        if let Some(v) = get("RETRY_BACKOFF_MULTIPLIER") {
            self.retry.backoff_multiplier = v
                .parse()
                .map_err(|_| ConfigError::Env("RETRY_BACKOFF_MULTIPLIER".into(), v.clone()))?;
        }
        if let Some(v) = get("RETRY_JITTER") {
            self.retry.jitter = v
                .parse()
                .map_err(|_| ConfigError::Env("RETRY_JITTER".into(), v.clone()))?;
        }

        Ok(())
    }
}
