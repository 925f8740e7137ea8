//! Retry policy for units of work
//!
//! Backoff doubles from `base_delay_ms` per attempt and is capped at
//! `max_delay_ms`. The `[retry]` table of `recordlayer.toml` deserializes
//! straight into [`RetryConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Retry Configuration
// ============================================================================

/// Configuration for transaction retry behavior
///
/// `Database::run` re-executes the whole unit of work on a retryable error
/// (conflict or transaction too old) up to `max_retries` times.
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new().with_max_retries(10).with_base_delay_ms(1);
/// db.run_with_retry(&config, |txn| store.save_record(txn, record.clone()))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: usize,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 2,
            max_delay_ms: 50,
        }
    }
}

impl RetryConfig {
    /// Default policy: 5 retries, 2ms base, 50ms cap
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt; conflicts surface as `TransactionFailed` immediately
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Sleep before retry number `attempt + 1`
    pub(crate) fn calculate_delay(&self, attempt: usize) -> Duration {
        let shift = attempt.min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
