//! # Configuration
//!
//! Environment-sourced settings for the dispatcher daemon and operator tools.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Added `CALL_TIMEOUT_SECONDS` and `TWILIO_PHONE_NUMBER` fallback
//! - 1.0.0: Initial release

use anyhow::Result;
use std::time::Duration;

/// Default endpoint for outbound phone calls
pub const DEFAULT_VAPI_API_URL: &str = "https://api.vapi.ai/call/phone";

/// Default time between poll cycles
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;

/// Default upper bound for a single outbound call request
pub const DEFAULT_CALL_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Private key for the voice-call API. `None` enables mock dispatch.
    pub vapi_private_key: Option<String>,
    /// Id of the outbound phone number registered with the voice-call API
    pub vapi_phone_number_id: Option<String>,
    pub vapi_api_url: String,
    pub database_path: String,
    pub log_level: String,
    pub poll_interval: Duration,
    pub call_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let poll_interval = parse_seconds(
            "POLL_INTERVAL_SECONDS",
            get("POLL_INTERVAL_SECONDS"),
            DEFAULT_POLL_INTERVAL_SECONDS,
        )?;
        let call_timeout = parse_seconds(
            "CALL_TIMEOUT_SECONDS",
            get("CALL_TIMEOUT_SECONDS"),
            DEFAULT_CALL_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            vapi_private_key: get("VAPI_PRIVATE_KEY"),
            vapi_phone_number_id: get("VAPI_PHONE_NUMBER_ID").or_else(|| get("TWILIO_PHONE_NUMBER")),
            vapi_api_url: get("VAPI_API_URL").unwrap_or_else(|| DEFAULT_VAPI_API_URL.to_string()),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "reminders.db".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            poll_interval,
            call_timeout,
        })
    }

    /// Whether calls will be simulated instead of placed
    pub fn is_mock_dispatch(&self) -> bool {
        self.vapi_private_key.is_none()
    }
}

fn parse_seconds(name: &str, value: Option<String>, default: u64) -> Result<Duration> {
    let seconds = match value {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid {}: '{}' ({})", name, raw, e))?,
        None => default,
    };

    if seconds == 0 {
        return Err(anyhow::anyhow!("{} must be greater than zero", name));
    }

    Ok(Duration::from_secs(seconds))
}
