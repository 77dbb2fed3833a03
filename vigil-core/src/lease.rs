//! Lease store contract: exclusive, time-bounded leases with monotonically
//! increasing fencing tokens.
//!
//! The lease store is the only mechanism by which two controller instances
//! coordinate. Contention is modeled as a normal outcome rather than an
//! error: a controller that finds the lease busy stops for this cycle and
//! re-enters evaluation on the next sampling tick.

use crate::{ControllerId, FencingToken, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An exclusively held, time-bounded right to run a failover attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverLease {
    /// Key the lease was acquired under.
    pub key: String,

    /// Holder identity.
    pub holder: ControllerId,

    /// Fencing token issued with this grant; strictly increases per key.
    pub token: FencingToken,

    /// Expiry time (milliseconds since Unix epoch).
    pub expires_at: u64,
}

/// Outcome of a lease acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The lease was granted to the caller.
    Granted(FailoverLease),

    /// Another controller already holds a valid lease.
    Busy {
        /// Current holder, if the store reports it.
        holder: Option<ControllerId>,
    },
}

/// Outcome of a lease renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewOutcome {
    /// Renewal succeeded; the lease now expires at the given time.
    Renewed { expires_at: u64 },

    /// The lease expired or was taken over; the caller no longer holds it.
    Lost,
}

/// A strongly consistent store granting exclusive, fenced leases.
///
/// Implementations must guarantee that at most one unexpired lease exists
/// per key at any time and that tokens issued for a key strictly increase.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Attempts to acquire the lease for `key` with the given time-to-live.
    ///
    /// Returns [`AcquireOutcome::Busy`] when another holder has a valid
    /// lease; that is not an error.
    async fn acquire(
        &self,
        key: &str,
        holder: ControllerId,
        ttl: Duration,
    ) -> Result<AcquireOutcome>;

    /// Extends the lease identified by `token`.
    ///
    /// Returns [`RenewOutcome::Lost`] if the token no longer identifies the
    /// current lease; the caller must treat that identically to an explicit
    /// loss notification.
    async fn renew(&self, token: FencingToken, ttl: Duration) -> Result<RenewOutcome>;

    /// Releases the lease identified by `token`.
    ///
    /// Releasing a token that is no longer current is a no-op.
    async fn release(&self, token: FencingToken) -> Result<()>;
}

impl FailoverLease {
    /// Whether the lease is expired at the given time.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at
    }
}
