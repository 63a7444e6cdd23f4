use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::ANTHROPIC_API_URL;
use crate::queue::RedeliveryPolicy;

const MAX_BATCH_SIZE: usize = 10;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset ⇒ in-memory entity table.
    pub database_url: Option<String>,
    /// Unset ⇒ in-process queues.
    pub redis_url: Option<String>,
    pub credential_encryption_key: String,
    pub brand_summary_queue: String,
    pub content_request_queue: String,
    pub worker_batch_size: usize,
    pub worker_poll_interval: Duration,
    pub max_receive_count: u32,
    /// Hold before the first redelivery of a failed message.
    pub retry_delay: Duration,
    pub llm_api_url: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let batch_size: usize = parse_or(&get, "WORKER_BATCH_SIZE", 10)?;

        Ok(Config {
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
            credential_encryption_key: get("CREDENTIAL_ENCRYPTION_KEY").with_context(|| {
                "Required environment variable 'CREDENTIAL_ENCRYPTION_KEY' is not set"
            })?,
            brand_summary_queue: or_default("BRAND_SUMMARY_QUEUE", "brand-summary-requests"),
            content_request_queue: or_default("CONTENT_REQUEST_QUEUE", "content-requests"),
            worker_batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            worker_poll_interval: Duration::from_millis(parse_or(
                &get,
                "WORKER_POLL_INTERVAL_MS",
                1000,
            )?),
            max_receive_count: parse_or(&get, "MAX_RECEIVE_COUNT", 3u32)?.max(1),
            retry_delay: Duration::from_millis(parse_or(&get, "RETRY_DELAY_MS", 30_000)?),
            llm_api_url: or_default("LLM_API_URL", ANTHROPIC_API_URL),
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: or_default("RUST_LOG", "info"),
        })
    }

    pub fn redelivery_policy(&self) -> RedeliveryPolicy {
        RedeliveryPolicy::new(self.max_receive_count, self.retry_delay)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
