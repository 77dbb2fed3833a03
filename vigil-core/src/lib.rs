//! # Vigil Core
//!
//! Core types and contracts for the Vigil failover controller.
//!
//! This crate defines the shared vocabulary of the system:
//! - Region identity, roles, and endpoints
//! - Health samples and the derived failover state
//! - Fencing tokens and the lease store contract
//! - Promotion and traffic-director adapter contracts
//! - The append-only audit log contract and its replay
//! - Best-effort notification
//!
//! All external collaborators (database engine, routing provider, lease
//! store, alerting channel) are reached only through the narrow async
//! traits defined here, so every one of them can be substituted with a
//! test double.

pub mod adapters;
pub mod audit;
pub mod config;
pub mod error;
pub mod lease;
pub mod notify;
pub mod types;

pub use adapters::{PromotionAdapter, PromotionOutcome, TrafficDirector};
pub use audit::{promotion_recorded, reconstruct_state, AuditLog};
pub use config::ControllerConfig;
pub use error::{FailoverError, Result};
pub use lease::{AcquireOutcome, FailoverLease, LeaseStore, RenewOutcome};
pub use notify::{EventSummary, Notifier, Severity, TracingNotifier};
pub use types::{
    now_millis, ControllerId, FailoverEvent, FailoverState, FailoverStep, FencingToken,
    HealthSample, RegionEndpoint, RegionId, RegionRole,
};
