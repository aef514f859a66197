use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Failed applications with fewer recorded failures than this are retry-eligible.
    /// Also bounds queue delivery attempts per task.
    pub max_retries: i32,
    pub resume_workers: usize,
    pub submit_workers: usize,
    pub llm_timeout: Duration,
    pub queue_prefix: String,
    pub queue_poll_interval: Duration,
    pub queue_backoff: Duration,
    /// Zero disables the periodic auto-apply scan.
    pub auto_apply_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_retries: parse_env("MAX_RETRIES", 3)?,
            resume_workers: parse_env("RESUME_WORKERS", 3)?,
            submit_workers: parse_env("SUBMIT_WORKERS", 5)?,
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 30)?),
            queue_prefix: std::env::var("QUEUE_PREFIX").unwrap_or_else(|_| "reach".to_string()),
            queue_poll_interval: Duration::from_millis(parse_env("QUEUE_POLL_MS", 500)?),
            queue_backoff: Duration::from_millis(parse_env("QUEUE_BACKOFF_MS", 2000)?),
            auto_apply_interval: Duration::from_secs(parse_env("AUTO_APPLY_INTERVAL_SECS", 0)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
