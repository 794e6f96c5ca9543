//! Engine configuration.
//!
//! Loaded from environment variables with the documented defaults: 20-minute
//! holds, a 2-minute sweep cycle and a 30-second retry-age cap on queued
//! purchase intents.

use crate::retry::RetryPolicy;
use std::env;
use std::str::FromStr;

/// Tunable parameters for the engine services.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a placed hold reserves a ticket, in minutes.
    pub hold_ttl_minutes: i64,
    /// How often the expiry sweeper runs, in seconds.
    pub sweep_interval_secs: u64,
    /// Oldest queued intent the fulfillment processor will still execute,
    /// in seconds.
    pub max_intent_age_secs: i64,
    /// How many times a conflicted transaction is re-run before giving up.
    pub transaction_retries: usize,
    /// Delay before a consumer re-subscribes after losing its stream,
    /// in seconds.
    pub consumer_retry_delay_secs: u64,
    /// Default page size for event listings.
    pub list_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_ttl_minutes: 20,
            sweep_interval_secs: 120,
            max_intent_age_secs: 30,
            transaction_retries: 3,
            consumer_retry_delay_secs: 5,
            list_page_size: 50,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hold_ttl_minutes: env_or("TICKETLINE_HOLD_TTL_MINUTES", defaults.hold_ttl_minutes),
            sweep_interval_secs: env_or(
                "TICKETLINE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            max_intent_age_secs: env_or(
                "TICKETLINE_MAX_INTENT_AGE_SECS",
                defaults.max_intent_age_secs,
            ),
            transaction_retries: env_or(
                "TICKETLINE_TRANSACTION_RETRIES",
                defaults.transaction_retries,
            ),
            consumer_retry_delay_secs: env_or(
                "TICKETLINE_CONSUMER_RETRY_DELAY_SECS",
                defaults.consumer_retry_delay_secs,
            ),
            list_page_size: env_or("TICKETLINE_LIST_PAGE_SIZE", defaults.list_page_size),
        }
    }

    /// The hold TTL as a duration.
    #[must_use]
    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_ttl_minutes)
    }

    /// The sweep interval as a duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    /// The retry-age cap as a duration.
    #[must_use]
    pub fn max_intent_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_intent_age_secs)
    }

    /// Delay before a consumer re-subscribes.
    #[must_use]
    pub const fn consumer_retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.consumer_retry_delay_secs)
    }

    /// The retry policy for optimistic transactions.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transaction_retries,
            ..RetryPolicy::default()
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
