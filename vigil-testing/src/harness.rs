//! Controller test harness: spawns a fully wired controller over in-memory
//! doubles and exposes handles for driving and inspecting it.

use crate::doubles::{
    down_sample, up_sample, InMemoryLeaseStore, RecordingNotifier, ScriptedPromotion,
    ScriptedTraffic,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vigil_core::{ControllerConfig, HealthSample, RegionEndpoint, RegionRole, Result};
use vigil_engine::{command_channel, ControllerHandle, FailoverController, StatusReport};
use vigil_persistence::InMemoryAuditLog;

/// Primary region name used throughout the test suite.
pub const PRIMARY: &str = "eu-west-1";

/// Secondary region name used throughout the test suite.
pub const SECONDARY: &str = "eu-central-1";

pub fn primary_endpoint() -> RegionEndpoint {
    RegionEndpoint::new(
        PRIMARY,
        RegionRole::Writer,
        vec!["https://primary.example/healthz".to_string()],
        "primary.db.example",
    )
}

pub fn secondary_endpoint() -> RegionEndpoint {
    RegionEndpoint::new(
        SECONDARY,
        RegionRole::Replica,
        vec!["https://secondary.example/healthz".to_string()],
        "secondary.db.example",
    )
}

/// Controller configuration tuned for fast tests: default hysteresis, tiny
/// backoff, sub-second lease timing.
pub fn fast_config() -> ControllerConfig {
    ControllerConfig::default()
        .with_probe_interval(Duration::from_millis(10))
        .with_probe_timeout(Duration::from_millis(50))
        .with_lease_ttl(Duration::from_secs(1))
        .with_lease_renew_interval(Duration::from_millis(100))
        .with_backoff(Duration::from_millis(2), Duration::from_millis(10))
}

/// Collaborator doubles handed to [`FailoverHarness::spawn_with`].
#[derive(Default)]
pub struct HarnessOptions {
    pub promotion: ScriptedPromotion,
    pub traffic: ScriptedTraffic,
    pub audit: InMemoryAuditLog,
    pub lease_store: InMemoryLeaseStore,
}

/// A spawned controller plus the handles needed to drive and observe it.
pub struct FailoverHarness {
    pub handle: ControllerHandle,
    pub sample_tx: mpsc::UnboundedSender<HealthSample>,
    pub audit: InMemoryAuditLog,
    pub lease_store: InMemoryLeaseStore,
    pub promotion: ScriptedPromotion,
    pub traffic: ScriptedTraffic,
    pub notifier: RecordingNotifier,
    pub join: JoinHandle<Result<()>>,
}

impl FailoverHarness {
    /// Spawns a controller with all-succeeding doubles.
    pub fn spawn(config: ControllerConfig) -> Self {
        Self::spawn_with(config, HarnessOptions::default())
    }

    pub fn spawn_with(config: ControllerConfig, options: HarnessOptions) -> Self {
        let (sample_tx, sample_rx) = mpsc::unbounded_channel();
        let (handle, command_rx) = command_channel();
        let notifier = RecordingNotifier::new();

        let controller = FailoverController::new(
            config,
            primary_endpoint(),
            secondary_endpoint(),
            options.lease_store.clone(),
            options.promotion.clone(),
            options.traffic.clone(),
            options.audit.clone(),
            notifier.clone(),
            sample_rx,
            command_rx,
        )
        .expect("harness config must be valid");

        let join = tokio::spawn(controller.run());

        Self {
            handle,
            sample_tx,
            audit: options.audit,
            lease_store: options.lease_store,
            promotion: options.promotion,
            traffic: options.traffic,
            notifier,
            join,
        }
    }

    /// Feeds `n` consecutive unhealthy primary samples.
    pub fn send_down(&self, n: usize) {
        for _ in 0..n {
            self.sample_tx
                .send(down_sample(PRIMARY))
                .expect("controller alive");
        }
    }

    /// Feeds one healthy primary sample.
    pub fn send_up(&self) {
        self.sample_tx
            .send(up_sample(PRIMARY))
            .expect("controller alive");
    }

    /// Polls status until at least `n` samples have been observed; commands
    /// and samples travel on separate channels, so this is how tests wait
    /// for sample processing to settle.
    pub async fn wait_for_samples(&self, n: u64) -> StatusReport {
        loop {
            let status = self.handle.status().await.expect("status reply");
            if status.stats.samples_observed >= n {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Stops the controller and returns its run result.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown()?;
        self.join
            .await
            .unwrap_or_else(|e| panic!("controller task panicked: {}", e))
    }
}
