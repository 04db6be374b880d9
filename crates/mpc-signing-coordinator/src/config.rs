//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{CoordinatorError, Result};

/// Retry configuration with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Attempts to make, never less than one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay following `delay_ms`, capped at `max_delay_ms`
    pub fn next_delay_ms(&self, delay_ms: u64) -> u64 {
        ((delay_ms as f64 * self.backoff_multiplier) as u64).min(self.max_delay_ms)
    }
}

/// Signing coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Hard deadline for a session, measured from admission
    pub session_timeout_secs: u64,
    /// How long a finished session's response is replayed to duplicates
    pub completed_retention_secs: u64,
    /// Retry policy for round dispatches
    pub dispatch_retry: RetryConfig,
    /// Retry policy for response and error event publication
    pub publish_retry: RetryConfig,
    /// Publish a `SigningResultErrorEvent` for every failure
    pub publish_error_events: bool,
    /// Verify composed signatures against the group key
    pub verify_signatures: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 30,
            completed_retention_secs: 60,
            dispatch_retry: RetryConfig::default(),
            publish_retry: RetryConfig::default(),
            publish_error_events: true,
            verify_signatures: false,
        }
    }
}

impl CoordinatorConfig {
    /// Parse a JSON configuration; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CoordinatorError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_timeout_secs == 0 {
            return Err(CoordinatorError::Config(
                "session_timeout_secs must be positive".into(),
            ));
        }
        for (name, retry) in [
            ("dispatch_retry", &self.dispatch_retry),
            ("publish_retry", &self.publish_retry),
        ] {
            if retry.backoff_multiplier < 1.0 {
                return Err(CoordinatorError::Config(format!(
                    "{name}.backoff_multiplier must be at least 1.0"
                )));
            }
        }
        Ok(())
    }

    pub fn with_session_timeout_secs(mut self, secs: u64) -> Self {
        self.session_timeout_secs = secs;
        self
    }

    pub fn with_completed_retention_secs(mut self, secs: u64) -> Self {
        self.completed_retention_secs = secs;
        self
    }

    pub fn with_dispatch_retry(mut self, retry: RetryConfig) -> Self {
        self.dispatch_retry = retry;
        self
    }

    pub fn with_publish_retry(mut self, retry: RetryConfig) -> Self {
        self.publish_retry = retry;
        self
    }

    pub fn with_error_events(mut self, enabled: bool) -> Self {
        self.publish_error_events = enabled;
        self
    }

    pub fn with_signature_verification(mut self, enabled: bool) -> Self {
        self.verify_signatures = enabled;
        self
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn completed_retention(&self) -> Duration {
        Duration::from_secs(self.completed_retention_secs)
    }
}
