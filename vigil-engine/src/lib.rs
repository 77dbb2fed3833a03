//! # Vigil Engine
//!
//! Health monitoring and the failover state machine.
//!
//! This crate provides:
//! - Per-region health monitoring with a bounded rolling window
//! - The serialized failover state machine (`FailoverController`)
//! - Lease renewal with fenced, cancellable adapter calls
//! - Exponential backoff for retryable step failures
//! - HTTP reference implementations of the probe and adapter contracts
//!
//! The controller is driven entirely through channels: health monitors feed
//! samples in, administrative callers send commands through a
//! [`ControllerHandle`], and every state transition executes on one
//! serialized loop.

pub mod adapters;
pub mod backoff;
pub mod controller;
pub mod health;

pub use adapters::{HttpPromotionAdapter, HttpTrafficDirector};
pub use backoff::BackoffPolicy;
pub use controller::{
    command_channel, CommandOutcome, ControllerCommand, ControllerHandle, ControllerStats,
    FailoverController, StatusReport,
};
pub use health::{HealthMonitor, HealthProbe, HealthWindow, HttpHealthProbe, WindowMap};
