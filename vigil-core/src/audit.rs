//! Audit log contract and replay.
//!
//! The audit log is the only state this component persists. Appends must
//! never be silently dropped: a failed append is fatal to the current step
//! and the append itself is retried, never the underlying action, since the
//! action may already have taken effect externally. Replay is used only at
//! controller startup to reconstruct the failover state for the current
//! fencing token.

use crate::{FailoverEvent, FailoverState, FailoverStep, FencingToken, Result};
use async_trait::async_trait;

/// Append-only, idempotent-replay record of failover steps.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Durably appends an event. Must not silently drop.
    async fn append(&self, event: &FailoverEvent) -> Result<()>;

    /// Returns the ordered event sequence for the given fencing token, or
    /// for the latest token present when `token` is `None`.
    async fn replay(&self, token: Option<FencingToken>) -> Result<Vec<FailoverEvent>>;

    /// Returns the highest fencing token with at least one recorded event.
    async fn latest_token(&self) -> Result<Option<FencingToken>>;
}

/// Reconstructs the failover state from an ordered event sequence.
///
/// Replaying the same sequence always yields the same state; this is the
/// sole startup source of truth, so in-memory state is never persisted.
///
/// # Examples
///
/// ```rust
/// use vigil_core::{
///     audit::reconstruct_state, FailoverEvent, FailoverState, FailoverStep, FencingToken,
/// };
///
/// let token = FencingToken::new(4);
/// let events = vec![
///     FailoverEvent::new(token, FailoverStep::LeaseAcquired, ""),
///     FailoverEvent::new(token, FailoverStep::PromotionStarted, "attempt 1"),
///     FailoverEvent::new(token, FailoverStep::PromotionDone, ""),
/// ];
/// assert_eq!(reconstruct_state(&events), FailoverState::Redirecting);
/// ```
pub fn reconstruct_state(events: &[FailoverEvent]) -> FailoverState {
    let mut state = FailoverState::Healthy;
    for event in events {
        state = match event.step {
            FailoverStep::LeaseAcquired | FailoverStep::PromotionStarted => {
                FailoverState::Promoting
            }
            FailoverStep::PromotionDone | FailoverStep::RedirectStarted => {
                FailoverState::Redirecting
            }
            FailoverStep::RedirectDone | FailoverStep::Completed => FailoverState::FailedOver,
            FailoverStep::PromotionFailed
            | FailoverStep::RedirectFailed
            | FailoverStep::Aborted => FailoverState::Aborted,
        };
    }
    state
}

/// Whether the sequence already contains a durable `PromotionDone`.
///
/// Used on resume to decide whether promotion may be skipped.
pub fn promotion_recorded(events: &[FailoverEvent]) -> bool {
    events
        .iter()
        .any(|e| e.step == FailoverStep::PromotionDone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(token: FencingToken, steps: &[FailoverStep]) -> Vec<FailoverEvent> {
        steps
            .iter()
            .map(|&step| FailoverEvent::new(token, step, ""))
            .collect()
    }

    #[test]
    fn empty_log_reconstructs_healthy() {
        assert_eq!(reconstruct_state(&[]), FailoverState::Healthy);
    }

    #[test]
    fn crash_after_promotion_resumes_redirecting() {
        let events = seq(
            FencingToken::new(2),
            &[
                FailoverStep::LeaseAcquired,
                FailoverStep::PromotionStarted,
                FailoverStep::PromotionDone,
            ],
        );
        assert_eq!(reconstruct_state(&events), FailoverState::Redirecting);
        assert!(promotion_recorded(&events));
    }

    #[test]
    fn crash_before_promotion_resumes_promoting() {
        let events = seq(
            FencingToken::new(2),
            &[FailoverStep::LeaseAcquired, FailoverStep::PromotionStarted],
        );
        assert_eq!(reconstruct_state(&events), FailoverState::Promoting);
        assert!(!promotion_recorded(&events));
    }

    #[test]
    fn completed_sequence_reconstructs_failed_over() {
        let events = seq(
            FencingToken::new(3),
            &[
                FailoverStep::LeaseAcquired,
                FailoverStep::PromotionStarted,
                FailoverStep::PromotionDone,
                FailoverStep::RedirectStarted,
                FailoverStep::RedirectDone,
                FailoverStep::Completed,
            ],
        );
        assert_eq!(reconstruct_state(&events), FailoverState::FailedOver);
    }

    #[test]
    fn failed_promotion_reconstructs_aborted() {
        let events = seq(
            FencingToken::new(5),
            &[
                FailoverStep::LeaseAcquired,
                FailoverStep::PromotionStarted,
                FailoverStep::PromotionFailed,
            ],
        );
        assert_eq!(reconstruct_state(&events), FailoverState::Aborted);
    }

    #[test]
    fn replay_is_deterministic() {
        let events = seq(
            FencingToken::new(9),
            &[
                FailoverStep::LeaseAcquired,
                FailoverStep::PromotionStarted,
                FailoverStep::PromotionDone,
                FailoverStep::RedirectStarted,
            ],
        );
        let first = reconstruct_state(&events);
        let second = reconstruct_state(&events);
        assert_eq!(first, second);
        assert_eq!(first, FailoverState::Redirecting);
    }
}
