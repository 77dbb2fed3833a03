//! # Core Types
//!
//! Fundamental types shared by every component of the Vigil failover
//! controller: region identity and roles, health samples, fencing tokens,
//! audit events, and the derived failover state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Identifier of a region participating in the failover topology.
///
/// Region identifiers are operator-assigned names such as `"eu-west-1"`.
///
/// # Examples
///
/// ```rust
/// use vigil_core::RegionId;
///
/// let region = RegionId::new("eu-west-1");
/// assert_eq!(region.as_str(), "eu-west-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub String);

impl RegionId {
    /// Creates a region identifier from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the region name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RegionId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RegionId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Role a region currently plays for the replicated data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionRole {
    /// Region accepts writes.
    Writer,
    /// Region serves a read-only replica.
    Replica,
}

impl fmt::Display for RegionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionRole::Writer => write!(f, "WRITER"),
            RegionRole::Replica => write!(f, "REPLICA"),
        }
    }
}

/// A region endpoint in the minimal primary/secondary topology.
///
/// Two instances exist per controller: the primary and the secondary. The
/// `role` field is mutated only by the failover state machine after a
/// confirmed promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEndpoint {
    /// Region identifier.
    pub region_id: RegionId,

    /// Current role of this region.
    pub role: RegionRole,

    /// Health probe targets. The region is healthy for a sample only if
    /// every target responds successfully within the probe timeout.
    pub health_urls: Vec<String>,

    /// Opaque routing target handed to the traffic director on redirect.
    pub routing_target: String,
}

impl RegionEndpoint {
    pub fn new(
        region_id: impl Into<RegionId>,
        role: RegionRole,
        health_urls: Vec<String>,
        routing_target: impl Into<String>,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            role,
            health_urls,
            routing_target: routing_target.into(),
        }
    }
}

/// Identity of a controller instance, used as the lease holder id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub Uuid);

impl ControllerId {
    /// Creates a new random controller identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ControllerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing token issued with a lease.
///
/// A stale holder's actions are detected and discarded by comparing the
/// token they were issued with the token currently held. Tokens issued by a
/// lease store start at 1; [`FencingToken::NONE`] marks audit events that
/// were recorded before any lease was granted.
///
/// # Examples
///
/// ```rust
/// use vigil_core::FencingToken;
///
/// let t1 = FencingToken::new(1);
/// let t2 = t1.next();
/// assert!(t2 > t1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FencingToken(pub u64);

impl FencingToken {
    /// Sentinel for "no lease held"; never issued by a lease store.
    pub const NONE: FencingToken = FencingToken(0);

    /// Creates a fencing token with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the next token in sequence.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the numeric value of this token.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FencingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single observation of a region's health.
///
/// Samples are immutable once created. They are produced by the health
/// monitor and aggregated by the state machine into a rolling window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSample {
    /// Region the sample was taken from.
    pub region_id: RegionId,

    /// When the sample was taken (milliseconds since Unix epoch).
    pub timestamp: u64,

    /// Whether every configured probe target responded successfully.
    pub healthy: bool,

    /// Worst-case probe latency across targets, in milliseconds.
    pub latency_ms: u64,

    /// First probe error observed, if any target failed.
    pub probe_error: Option<String>,
}

impl HealthSample {
    /// Creates a healthy sample with the given latency.
    pub fn healthy(region_id: impl Into<RegionId>, latency_ms: u64) -> Self {
        Self {
            region_id: region_id.into(),
            timestamp: now_millis(),
            healthy: true,
            latency_ms,
            probe_error: None,
        }
    }

    /// Creates an unhealthy sample carrying the probe error.
    pub fn unhealthy(region_id: impl Into<RegionId>, error: impl Into<String>) -> Self {
        Self {
            region_id: region_id.into(),
            timestamp: now_millis(),
            healthy: false,
            latency_ms: 0,
            probe_error: Some(error.into()),
        }
    }
}

/// Steps recorded in the audit log for a failover attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailoverStep {
    /// Lease granted, fencing token assigned.
    LeaseAcquired,
    /// A promotion attempt was issued (one event per attempt).
    PromotionStarted,
    /// Promotion confirmed by the adapter.
    PromotionDone,
    /// Promotion terminally failed.
    PromotionFailed,
    /// A redirect attempt was issued (one event per attempt).
    RedirectStarted,
    /// Traffic redirect confirmed by the adapter.
    RedirectDone,
    /// Redirect terminally failed.
    RedirectFailed,
    /// Attempt finished; lease released.
    Completed,
    /// Attempt abandoned (contention, fatal failure, or lease loss).
    Aborted,
}

impl fmt::Display for FailoverStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailoverStep::LeaseAcquired => "LEASE_ACQUIRED",
            FailoverStep::PromotionStarted => "PROMOTION_STARTED",
            FailoverStep::PromotionDone => "PROMOTION_DONE",
            FailoverStep::PromotionFailed => "PROMOTION_FAILED",
            FailoverStep::RedirectStarted => "REDIRECT_STARTED",
            FailoverStep::RedirectDone => "REDIRECT_DONE",
            FailoverStep::RedirectFailed => "REDIRECT_FAILED",
            FailoverStep::Completed => "COMPLETED",
            FailoverStep::Aborted => "ABORTED",
        };
        write!(f, "{}", s)
    }
}

/// An append-only audit record of one step taken by the state machine.
///
/// The ordered sequence of events for a fencing token is the source of truth
/// for resuming after a crash. A new token starts a new, disjoint sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverEvent {
    /// Unique identifier for this record.
    pub event_id: Uuid,

    /// Token of the lease under which the step was taken.
    pub fencing_token: FencingToken,

    /// The step this record describes.
    pub step: FailoverStep,

    /// When the step was recorded (milliseconds since Unix epoch).
    pub timestamp: u64,

    /// Free-form detail: attempt numbers, error text, holder identity.
    pub detail: String,
}

impl FailoverEvent {
    /// Creates a new audit record for the given token and step.
    pub fn new(fencing_token: FencingToken, step: FailoverStep, detail: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            fencing_token,
            step,
            timestamp: now_millis(),
            detail: detail.into(),
        }
    }
}

/// Derived, in-memory state of the failover state machine.
///
/// Never persisted independently: on startup it is reconstructed by replaying
/// the audit log for the current fencing token, which avoids a second source
/// of truth drifting from the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailoverState {
    /// Primary looks healthy; nothing in flight.
    Healthy,
    /// Unhealthy samples observed, confirmation window not yet elapsed.
    Suspected,
    /// Confirmation reached; lease acquisition in progress.
    LockAcquiring,
    /// Lease held; promoting the secondary to writer.
    Promoting,
    /// Promotion durably recorded; repointing traffic.
    Redirecting,
    /// Failover complete for this token.
    FailedOver,
    /// Operator-triggered restoration of the old primary (extension point).
    Recovering,
    /// Attempt abandoned for this token.
    Aborted,
}

impl fmt::Display for FailoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailoverState::Healthy => "HEALTHY",
            FailoverState::Suspected => "SUSPECTED",
            FailoverState::LockAcquiring => "LOCK_ACQUIRING",
            FailoverState::Promoting => "PROMOTING",
            FailoverState::Redirecting => "REDIRECTING",
            FailoverState::FailedOver => "FAILED_OVER",
            FailoverState::Recovering => "RECOVERING",
            FailoverState::Aborted => "ABORTED",
        };
        write!(f, "{}", s)
    }
}

impl FailoverState {
    /// Whether this state is terminal for its fencing token.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailoverState::FailedOver | FailoverState::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fencing_tokens_are_ordered() {
        let t1 = FencingToken::new(1);
        assert!(t1 > FencingToken::NONE);
        assert!(t1.next() > t1);
        assert_eq!(t1.next().value(), 2);
    }

    #[test]
    fn samples_capture_probe_errors() {
        let sample = HealthSample::unhealthy("eu-west-1", "connection refused");
        assert!(!sample.healthy);
        assert_eq!(sample.probe_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn event_roundtrips_through_json() {
        let event = FailoverEvent::new(FencingToken::new(7), FailoverStep::PromotionDone, "ok");
        let bytes = serde_json::to_vec(&event).unwrap();
        let back: FailoverEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn terminal_states() {
        assert!(FailoverState::FailedOver.is_terminal());
        assert!(FailoverState::Aborted.is_terminal());
        assert!(!FailoverState::Redirecting.is_terminal());
    }
}
