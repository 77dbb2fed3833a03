//! # Vigil Persistence
//!
//! Audit log and lease store implementations for the Vigil failover
//! controller.
//!
//! The audit log is the only state the controller persists; the ordered
//! event sequence per fencing token is the source of truth for resuming
//! after a crash.
//!
//! ## Implementations
//!
//! - [`InMemoryAuditLog`] - events kept in memory (testing/embedded)
//! - [`FileAuditLog`] - append-only checksummed JSON-lines file, fsynced
//!   per append
//! - [`FileLeaseStore`] - single-host file-backed lease store with
//!   strictly increasing fencing tokens

pub mod file_system;
pub mod in_memory;
pub mod lease_file;
mod tests;

pub use file_system::FileAuditLog;
pub use in_memory::InMemoryAuditLog;
pub use lease_file::FileLeaseStore;
