//! Configuration management for the client.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::ConfigError;
use reqwest::Url;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Bounds for the post-payment bookings poll interval, in seconds
const POLL_INTERVAL_BOUNDS: (u64, u64) = (3, 10);

/// Client configuration loaded from environment variables.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend REST API base URL
    pub api_url: String,
    /// ISO currency code sent with payment intents
    pub currency: String,
    /// Processing fee added at checkout, in basis points
    pub processing_fee_bps: u32,
    /// Interval between bookings polls after a gateway return
    pub poll_interval: Duration,
    /// Poll attempts before giving up on highlighting a booking
    pub poll_max_attempts: u32,
    /// Per-order ticket limit
    pub max_tickets_per_order: u32,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Notices kept on screen before the oldest is dropped
    pub max_notices: usize,
    /// Stored bearer token to restore a session at startup
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            currency: "BDT".to_string(),
            processing_fee_bps: 250,
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 24,
            max_tickets_per_order: 10,
            request_timeout: Duration::from_secs(30),
            max_notices: 5,
            auth_token: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("currency", &self.currency)
            .field("processing_fee_bps", &self.processing_fee_bps)
            .field("poll_interval", &self.poll_interval)
            .field("poll_max_attempts", &self.poll_max_attempts)
            .field("max_tickets_per_order", &self.max_tickets_per_order)
            .field("request_timeout", &self.request_timeout)
            .field("max_notices", &self.max_notices)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to [`ClientConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = match get("EVENTHUB_API_URL") {
            Some(raw) => {
                Url::parse(&raw).map_err(|e| invalid("EVENTHUB_API_URL", &raw, e.to_string()))?;
                raw.trim_end_matches('/').to_string()
            },
            None => defaults.api_url,
        };

        let currency = match get("EVENTHUB_CURRENCY") {
            Some(raw) if raw.len() == 3 && raw.chars().all(|c| c.is_ascii_alphabetic()) => {
                raw.to_ascii_uppercase()
            },
            Some(raw) => {
                return Err(invalid("EVENTHUB_CURRENCY", &raw, "expected a 3-letter code"));
            },
            None => defaults.currency,
        };

        let processing_fee_bps: u32 =
            parsed(&get, "EVENTHUB_PROCESSING_FEE_BPS", defaults.processing_fee_bps)?;
        if processing_fee_bps > 10_000 {
            return Err(invalid(
                "EVENTHUB_PROCESSING_FEE_BPS",
                &processing_fee_bps.to_string(),
                "fee cannot exceed 100%",
            ));
        }

        let poll_secs: u64 = parsed(
            &get,
            "EVENTHUB_POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
        )?;
        let (min_poll, max_poll) = POLL_INTERVAL_BOUNDS;

        let max_tickets_per_order: u32 = parsed(
            &get,
            "EVENTHUB_MAX_TICKETS_PER_ORDER",
            defaults.max_tickets_per_order,
        )?;
        if max_tickets_per_order == 0 {
            return Err(invalid("EVENTHUB_MAX_TICKETS_PER_ORDER", "0", "must be at least 1"));
        }

        let timeout_secs: u64 = parsed(
            &get,
            "EVENTHUB_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(invalid("EVENTHUB_REQUEST_TIMEOUT_SECS", "0", "must be at least 1"));
        }

        Ok(Self {
            api_url,
            currency,
            processing_fee_bps,
            poll_interval: Duration::from_secs(poll_secs.clamp(min_poll, max_poll)),
            poll_max_attempts: parsed(&get, "EVENTHUB_POLL_MAX_ATTEMPTS", defaults.poll_max_attempts)?
                .max(1),
            max_tickets_per_order,
            request_timeout: Duration::from_secs(timeout_secs),
            max_notices: parsed(&get, "EVENTHUB_MAX_NOTICES", defaults.max_notices)?.max(1),
            auth_token: get("EVENTHUB_AUTH_TOKEN"),
        })
    }
}

fn parsed<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(load(&[]).unwrap(), ClientConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("EVENTHUB_API_URL", "https://api.example.com/api/"),
            ("EVENTHUB_CURRENCY", "usd"),
            ("EVENTHUB_PROCESSING_FEE_BPS", "300"),
            ("EVENTHUB_MAX_TICKETS_PER_ORDER", "4"),
            ("EVENTHUB_AUTH_TOKEN", "tok"),
        ])
        .unwrap();

        assert_eq!(config.api_url, "https://api.example.com/api");
        assert_eq!(config.currency, "USD");
        assert_eq!(config.processing_fee_bps, 300);
        assert_eq!(config.max_tickets_per_order, 4);
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
    }

    #[test]
    fn poll_interval_is_clamped() {
        let fast = load(&[("EVENTHUB_POLL_INTERVAL_SECS", "1")]).unwrap();
        let slow = load(&[("EVENTHUB_POLL_INTERVAL_SECS", "60")]).unwrap();
        assert_eq!(fast.poll_interval, Duration::from_secs(3));
        assert_eq!(slow.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn rejects_garbage() {
        let err = load(&[("EVENTHUB_PROCESSING_FEE_BPS", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "EVENTHUB_PROCESSING_FEE_BPS", .. }));

        assert!(load(&[("EVENTHUB_API_URL", "not a url")]).is_err());
        assert!(load(&[("EVENTHUB_MAX_TICKETS_PER_ORDER", "0")]).is_err());
        assert!(load(&[("EVENTHUB_PROCESSING_FEE_BPS", "20000")]).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let config = load(&[("EVENTHUB_AUTH_TOKEN", "secret-token")]).unwrap();
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
