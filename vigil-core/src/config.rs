//! Controller configuration: probe cadence, hysteresis threshold, lease
//! timing, and retry/backoff tuning. Loaded once at startup.

use crate::{FailoverError, Result};
use std::time::Duration;

/// Configuration for a failover controller instance.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Consecutive unhealthy samples required before acting (hysteresis).
    pub unhealthy_sample_threshold: u32,

    /// Interval between health sampling passes.
    pub probe_interval: Duration,

    /// Per-probe timeout.
    pub probe_timeout: Duration,

    /// Time-to-live requested for the failover lease.
    pub lease_ttl: Duration,

    /// Interval between lease renewals while a step is in flight.
    pub lease_renew_interval: Duration,

    /// Maximum attempts per step (promotion, redirect).
    pub max_step_retries: u32,

    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,

    /// Cap on the backoff delay.
    pub backoff_cap: Duration,

    /// Capacity of the rolling health window per region.
    pub window_size: usize,

    /// Key under which the failover lease is acquired.
    pub lease_key: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            unhealthy_sample_threshold: 3,
            probe_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            lease_ttl: Duration::from_secs(30),
            lease_renew_interval: Duration::from_secs(10),
            max_step_retries: 5,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            window_size: 32,
            lease_key: "vigil/failover".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unhealthy_sample_threshold(mut self, threshold: u32) -> Self {
        self.unhealthy_sample_threshold = threshold;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    pub fn with_lease_renew_interval(mut self, interval: Duration) -> Self {
        self.lease_renew_interval = interval;
        self
    }

    pub fn with_max_step_retries(mut self, retries: u32) -> Self {
        self.max_step_retries = retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    pub fn with_lease_key(mut self, key: impl Into<String>) -> Self {
        self.lease_key = key.into();
        self
    }

    /// Rejects configurations the controller cannot operate under.
    pub fn validate(&self) -> Result<()> {
        if self.unhealthy_sample_threshold == 0 {
            return Err(FailoverError::config(
                "unhealthy_sample_threshold must be at least 1",
            ));
        }
        if self.lease_ttl.is_zero() {
            return Err(FailoverError::config("lease_ttl must be non-zero"));
        }
        if self.lease_renew_interval >= self.lease_ttl {
            return Err(FailoverError::config(
                "lease_renew_interval must be shorter than lease_ttl",
            ));
        }
        if self.max_step_retries == 0 {
            return Err(FailoverError::config("max_step_retries must be at least 1"));
        }
        if self.window_size < self.unhealthy_sample_threshold as usize {
            return Err(FailoverError::config(
                "window_size must hold at least unhealthy_sample_threshold samples",
            ));
        }
        if self.backoff_cap < self.backoff_base {
            return Err(FailoverError::config(
                "backoff_cap must be at least backoff_base",
            ));
        }
        Ok(())
    }
}
