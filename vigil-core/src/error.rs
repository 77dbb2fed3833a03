//! # Error Types
//!
//! Error taxonomy for failover operations.
//!
//! The taxonomy distinguishes retryable conditions (timeouts, transient
//! adapter unavailability) from fatal ones (a promotion target that does not
//! exist, a lost lease, a corrupted audit record). Only retryable errors
//! drive the backoff loop; everything else terminates the attempt.

use crate::{FencingToken, RegionId};
use thiserror::Error;

/// Errors that can occur during failover operations.
#[derive(Error, Debug)]
pub enum FailoverError {
    /// A health probe failed or timed out.
    ///
    /// Never escalated on its own; absorbed into an unhealthy sample by the
    /// health monitor.
    #[error("Probe failure for region {region_id}: {reason}")]
    Probe { region_id: RegionId, reason: String },

    /// The lease was lost or expired while an operation was in flight.
    #[error("Lease lost for fencing token {token}")]
    LeaseLost { token: FencingToken },

    /// A transient adapter or store failure that may succeed on retry.
    #[error("Transient failure during {operation}: {reason}")]
    Transient { operation: String, reason: String },

    /// An operation exceeded its timeout.
    #[error("Timeout during {operation}")]
    Timeout { operation: String },

    /// Promotion terminally failed for the target region.
    #[error("Promotion of region {region_id} failed: {reason}")]
    PromotionFailed { region_id: RegionId, reason: String },

    /// Traffic redirect terminally failed for the target region.
    #[error("Redirect to region {region_id} failed: {reason}")]
    RedirectFailed { region_id: RegionId, reason: String },

    /// The audit log could not durably record an event.
    ///
    /// Fatal to the controller process: it cannot safely proceed without
    /// durable history.
    #[error("Audit log failure: {message}")]
    Audit { message: String },

    /// A persisted audit record failed its integrity check.
    #[error("Audit record corruption: expected crc {expected}, got {actual}")]
    AuditCorruption { expected: u32, actual: u32 },

    /// A state transition that the state machine does not permit.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File system or network I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for results in the Vigil failover system.
pub type Result<T> = std::result::Result<T, FailoverError>;

impl FailoverError {
    /// Creates a probe error for the given region.
    pub fn probe(region_id: impl Into<RegionId>, reason: impl Into<String>) -> Self {
        Self::Probe {
            region_id: region_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transient, retryable error for the named operation.
    pub fn transient(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a fatal promotion error.
    pub fn promotion_failed(region_id: impl Into<RegionId>, reason: impl Into<String>) -> Self {
        Self::PromotionFailed {
            region_id: region_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a fatal redirect error.
    pub fn redirect_failed(region_id: impl Into<RegionId>, reason: impl Into<String>) -> Self {
        Self::RedirectFailed {
            region_id: region_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an audit log error.
    pub fn audit(message: impl Into<String>) -> Self {
        Self::Audit {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// Only retryable errors drive the exponential backoff loop; fatal
    /// errors terminate the failover attempt.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vigil_core::FailoverError;
    ///
    /// assert!(FailoverError::transient("promote", "connection reset").is_retryable());
    /// assert!(!FailoverError::promotion_failed("eu-west-1", "no such region").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }
}

impl From<anyhow::Error> for FailoverError {
    fn from(err: anyhow::Error) -> Self {
        FailoverError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(FailoverError::timeout("redirect").is_retryable());
        assert!(FailoverError::transient("promote", "503").is_retryable());
        assert!(!FailoverError::LeaseLost {
            token: FencingToken::new(3)
        }
        .is_retryable());
        assert!(!FailoverError::redirect_failed("eu-central-1", "bad target").is_retryable());
        assert!(!FailoverError::audit("disk full").is_retryable());
    }
}
