use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Override for the Graph API host (staging, local fakes).
    pub graph_api_base_url: Option<String>,
    /// Master switch for the delivery scanner; off unless explicitly enabled.
    pub delivery_enabled: bool,
    pub delivery_interval_secs: u64,
    pub delivery_batch_size: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            graph_api_base_url: env::var("GRAPH_API_BASE_URL").ok(),
            delivery_enabled: env::var("OUTBOUND_DELIVERY_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            delivery_interval_secs: env::var("OUTBOUND_DELIVERY_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("OUTBOUND_DELIVERY_INTERVAL_SECS must be a valid number")?,
            delivery_batch_size: env::var("OUTBOUND_DELIVERY_BATCH_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("OUTBOUND_DELIVERY_BATCH_SIZE must be a valid number")?,
        })
    }
}
