//! Best-effort notification of state transitions and failures.
//!
//! Notification is not on the safety-critical path: publish failures are
//! logged and never block or fail a state transition.

use crate::{now_millis, FailoverState, FencingToken, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Severity of a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    /// Must reach a human: fatal adapter failures and audit-log failures.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Human-readable summary of a state transition or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub severity: Severity,
    pub state: FailoverState,
    pub token: FencingToken,
    pub message: String,
    pub timestamp: u64,
}

impl EventSummary {
    pub fn new(
        severity: Severity,
        state: FailoverState,
        token: FencingToken,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            state,
            token,
            message: message.into(),
            timestamp: now_millis(),
        }
    }
}

/// Publishes event summaries to an external alerting channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Best-effort publish. Callers log failures and continue.
    async fn publish(&self, summary: &EventSummary) -> Result<()>;
}

/// Default notifier that emits summaries through the tracing subscriber.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn publish(&self, summary: &EventSummary) -> Result<()> {
        match summary.severity {
            Severity::Info => info!(
                state = %summary.state,
                token = %summary.token,
                "{}",
                summary.message
            ),
            Severity::Warning => warn!(
                state = %summary.state,
                token = %summary.token,
                "{}",
                summary.message
            ),
            Severity::Critical => error!(
                state = %summary.state,
                token = %summary.token,
                "{}",
                summary.message
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_notifier_never_fails() {
        let notifier = TracingNotifier::new();
        let summary = EventSummary::new(
            Severity::Critical,
            FailoverState::Aborted,
            FencingToken::new(1),
            "promotion failed terminally",
        );
        assert!(notifier.publish(&summary).await.is_ok());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
