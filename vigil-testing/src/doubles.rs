//! Test doubles for every external collaborator of the controller.
//!
//! All doubles are cheaply cloneable and share state through `Arc`, so a
//! test can keep a handle for inspection while the controller owns its copy.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{
    now_millis, AcquireOutcome, ControllerId, EventSummary, FailoverError, FailoverLease,
    FencingToken, HealthSample, LeaseStore, Notifier, PromotionAdapter, PromotionOutcome,
    RegionId, RenewOutcome, Result, TrafficDirector,
};
use vigil_engine::HealthProbe;

#[derive(Debug, Default)]
struct LeaseInner {
    last_token: u64,
    current: Option<FailoverLease>,
}

/// In-memory lease store with strictly increasing fencing tokens.
///
/// Enforces the mutual-exclusion contract: at most one unexpired lease per
/// store. Clones share the same lease.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaseStore {
    inner: Arc<Mutex<LeaseInner>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes the current lease, simulating expiry or takeover. The next
    /// renewal by the old holder reports loss.
    pub fn revoke(&self) {
        self.inner.lock().current = None;
    }

    /// Current holder, if a valid lease exists.
    pub fn current_holder(&self) -> Option<ControllerId> {
        let inner = self.inner.lock();
        inner
            .current
            .as_ref()
            .filter(|l| !l.is_expired_at(now_millis()))
            .map(|l| l.holder)
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn acquire(
        &self,
        key: &str,
        holder: ControllerId,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        let mut inner = self.inner.lock();
        let now = now_millis();

        if let Some(current) = &inner.current {
            if current.key == key && !current.is_expired_at(now) {
                return Ok(AcquireOutcome::Busy {
                    holder: Some(current.holder),
                });
            }
        }

        inner.last_token += 1;
        let lease = FailoverLease {
            key: key.to_string(),
            holder,
            token: FencingToken::new(inner.last_token),
            expires_at: now + ttl.as_millis() as u64,
        };
        inner.current = Some(lease.clone());
        Ok(AcquireOutcome::Granted(lease))
    }

    async fn renew(&self, token: FencingToken, ttl: Duration) -> Result<RenewOutcome> {
        let mut inner = self.inner.lock();
        let now = now_millis();

        match &mut inner.current {
            Some(current) if current.token == token && !current.is_expired_at(now) => {
                let expires_at = now + ttl.as_millis() as u64;
                current.expires_at = expires_at;
                Ok(RenewOutcome::Renewed { expires_at })
            }
            _ => Ok(RenewOutcome::Lost),
        }
    }

    async fn release(&self, token: FencingToken) -> Result<()> {
        let mut inner = self.inner.lock();
        if matches!(&inner.current, Some(current) if current.token == token) {
            inner.current = None;
        }
        Ok(())
    }
}

/// One scripted adapter response.
#[derive(Debug, Clone)]
pub enum AdapterScript {
    /// Return success.
    Succeed,
    /// Return a retryable error with the given reason.
    Retryable(String),
    /// Return a fatal error with the given reason.
    Fatal(String),
    /// Never return; used to exercise lease-loss cancellation.
    Hang,
}

#[derive(Debug, Default)]
struct PromotionInner {
    script: VecDeque<AdapterScript>,
    promoted: HashSet<RegionId>,
    calls: Vec<(RegionId, FencingToken)>,
}

/// Promotion adapter driven by a script, idempotent once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPromotion {
    inner: Arc<Mutex<PromotionInner>>,
}

impl ScriptedPromotion {
    /// Adapter that succeeds on every call.
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<AdapterScript>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PromotionInner {
                script: script.into(),
                ..Default::default()
            })),
        }
    }

    /// Every call made, with the fencing token it carried.
    pub fn calls(&self) -> Vec<(RegionId, FencingToken)> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }
}

#[async_trait]
impl PromotionAdapter for ScriptedPromotion {
    async fn promote(
        &self,
        region_id: &RegionId,
        token: FencingToken,
    ) -> Result<PromotionOutcome> {
        let next = {
            let mut inner = self.inner.lock();
            inner.calls.push((region_id.clone(), token));
            inner.script.pop_front()
        };

        match next {
            // Script exhausted: succeed, idempotently.
            None | Some(AdapterScript::Succeed) => {
                self.inner.lock().promoted.insert(region_id.clone());
                Ok(PromotionOutcome {
                    new_role_confirmed: true,
                })
            }
            Some(AdapterScript::Retryable(reason)) => {
                Err(FailoverError::transient("promote", reason))
            }
            Some(AdapterScript::Fatal(reason)) => {
                Err(FailoverError::promotion_failed(region_id.clone(), reason))
            }
            Some(AdapterScript::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[derive(Debug, Default)]
struct TrafficInner {
    script: VecDeque<AdapterScript>,
    redirected_to: Option<RegionId>,
    calls: Vec<(RegionId, FencingToken)>,
}

/// Traffic director driven by a script, idempotent once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTraffic {
    inner: Arc<Mutex<TrafficInner>>,
}

impl ScriptedTraffic {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<AdapterScript>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrafficInner {
                script: script.into(),
                ..Default::default()
            })),
        }
    }

    pub fn calls(&self) -> Vec<(RegionId, FencingToken)> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Region traffic currently points at, if a redirect succeeded.
    pub fn redirected_to(&self) -> Option<RegionId> {
        self.inner.lock().redirected_to.clone()
    }
}

#[async_trait]
impl TrafficDirector for ScriptedTraffic {
    async fn redirect(&self, target: &RegionId, token: FencingToken) -> Result<()> {
        let next = {
            let mut inner = self.inner.lock();
            inner.calls.push((target.clone(), token));
            inner.script.pop_front()
        };

        match next {
            None | Some(AdapterScript::Succeed) => {
                self.inner.lock().redirected_to = Some(target.clone());
                Ok(())
            }
            Some(AdapterScript::Retryable(reason)) => {
                Err(FailoverError::transient("redirect", reason))
            }
            Some(AdapterScript::Fatal(reason)) => {
                Err(FailoverError::redirect_failed(target.clone(), reason))
            }
            Some(AdapterScript::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Probe that pops scripted up/down outcomes, then stays up.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    outcomes: Arc<Mutex<VecDeque<bool>>>,
}

impl ScriptedProbe {
    pub fn new(outcomes: &[bool]) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.iter().copied().collect())),
        }
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, url: &str, _timeout: Duration) -> Result<Duration> {
        let up = self.outcomes.lock().pop_front().unwrap_or(true);
        if up {
            Ok(Duration::from_millis(1))
        } else {
            Err(FailoverError::probe(url, "scripted failure"))
        }
    }
}

/// Notifier that records every published summary.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    published: Arc<Mutex<Vec<EventSummary>>>,
    fail_publishes: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<EventSummary> {
        self.published.lock().clone()
    }

    /// Makes every subsequent publish fail, to exercise the best-effort
    /// contract.
    pub fn start_failing(&self) {
        *self.fail_publishes.lock() = true;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, summary: &EventSummary) -> Result<()> {
        if *self.fail_publishes.lock() {
            return Err(FailoverError::transient("publish", "notifier down"));
        }
        self.published.lock().push(summary.clone());
        Ok(())
    }
}

/// Audit log wrapper that fails a set number of appends before recovering.
#[derive(Debug, Clone)]
pub struct FlakyAuditLog<A> {
    inner: A,
    failures_remaining: Arc<Mutex<u32>>,
}

impl<A> FlakyAuditLog<A> {
    pub fn new(inner: A, failures: u32) -> Self {
        Self {
            inner,
            failures_remaining: Arc::new(Mutex::new(failures)),
        }
    }
}

#[async_trait]
impl<A: vigil_core::AuditLog> vigil_core::AuditLog for FlakyAuditLog<A> {
    async fn append(&self, event: &vigil_core::FailoverEvent) -> Result<()> {
        {
            let mut remaining = self.failures_remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FailoverError::audit("injected append failure"));
            }
        }
        self.inner.append(event).await
    }

    async fn replay(
        &self,
        token: Option<FencingToken>,
    ) -> Result<Vec<vigil_core::FailoverEvent>> {
        self.inner.replay(token).await
    }

    async fn latest_token(&self) -> Result<Option<FencingToken>> {
        self.inner.latest_token().await
    }
}

/// Convenience constructor for unhealthy primary samples in tests.
pub fn down_sample(region: &str) -> HealthSample {
    HealthSample::unhealthy(region, "probe timeout")
}

/// Convenience constructor for healthy primary samples in tests.
pub fn up_sample(region: &str) -> HealthSample {
    HealthSample::healthy(region, 12)
}
