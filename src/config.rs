use std::time::Duration;

use anyhow::{Context, Result, bail};

pub const STOP_TIMEOUT_ENV: &str = "PIDGUARD_STOP_TIMEOUT_MS";
pub const POLL_INTERVAL_ENV: &str = "PIDGUARD_POLL_INTERVAL_MS";

/// Host-side tunables for the `pidguard` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// How long `stop` waits for the pidfile to disappear, in milliseconds.
    pub stop_timeout_ms: u64,
    /// How often `stop` checks for the pidfile, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl GuardConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults for unset variables.
    ///
    /// # Errors
    /// Returns an error if a variable is set but is not a valid value.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    /// Returns an error if a present value is not a non-negative integer, or
    /// if the poll interval is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut out = Self::default();

        if let Some(v) = lookup(STOP_TIMEOUT_ENV) {
            out.stop_timeout_ms = parse_millis(STOP_TIMEOUT_ENV, &v)?;
        }
        if let Some(v) = lookup(POLL_INTERVAL_ENV) {
            out.poll_interval_ms = parse_millis(POLL_INTERVAL_ENV, &v)?;
            if out.poll_interval_ms == 0 {
                bail!("{POLL_INTERVAL_ENV} must be greater than zero");
            }
        }

        Ok(out)
    }

    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid {key}: {value:?}"))
}
