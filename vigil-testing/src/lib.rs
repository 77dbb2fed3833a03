//! # Vigil Testing
//!
//! Test doubles and a controller harness for the Vigil failover controller.
//!
//! The doubles cover every external collaborator: lease store, promotion
//! adapter, traffic director, audit log, health probe, and notifier. The
//! harness wires them into a running controller so integration tests can
//! drive health samples and administrative commands and then inspect the
//! audit log, notifications, and adapter call records.

pub mod doubles;
pub mod harness;

pub use doubles::{
    down_sample, up_sample, AdapterScript, FlakyAuditLog, InMemoryLeaseStore, RecordingNotifier,
    ScriptedProbe, ScriptedPromotion, ScriptedTraffic,
};
pub use harness::{
    fast_config, primary_endpoint, secondary_endpoint, FailoverHarness, HarnessOptions, PRIMARY,
    SECONDARY,
};
