//! Capability contracts wrapping the external database engine and traffic
//! routing provider.
//!
//! Both adapters are constructor-injected and substitutable with test
//! doubles. Both must be idempotent: re-issuing a call that already took
//! effect returns success without further side effects, which is what makes
//! crash-resume safe. Every call carries the fencing token it was issued
//! under so that a stale holder's work can be detected and discarded.

use crate::{FencingToken, RegionId, Result};
use async_trait::async_trait;

/// Result of a successful promotion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionOutcome {
    /// Whether the adapter confirmed the target now holds the writer role.
    pub new_role_confirmed: bool,
}

/// Promotes a secondary replica to writer role.
///
/// Errors distinguish retryable conditions (`Transient`, `Timeout`) from
/// fatal ones (`PromotionFailed`); only retryable errors drive the backoff
/// loop. Promoting a region that is already the writer under the same
/// ownership must return success without side effects.
#[async_trait]
pub trait PromotionAdapter: Send + Sync {
    async fn promote(&self, region_id: &RegionId, token: FencingToken)
        -> Result<PromotionOutcome>;
}

/// Repoints client traffic to a new writer region.
///
/// Called only after promotion is durably confirmed. Redirecting to a region
/// that already receives the traffic must return success without side
/// effects.
#[async_trait]
pub trait TrafficDirector: Send + Sync {
    async fn redirect(&self, target: &RegionId, token: FencingToken) -> Result<()>;
}
