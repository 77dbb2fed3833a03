//! Subcommand implementations.
//!
//! `run` hosts the monitors and the controller until a shutdown signal.
//! The one-shot commands (`trigger`, `abort`, `resume`) wire a controller
//! over the same persistent stores, issue a single command, and map its
//! outcome to the exit-code contract. `status` only reads: it replays the
//! audit log and inspects the lease file without starting a controller.

use crate::settings::ControllerSettings;
use anyhow::Context;
use dashmap::DashMap;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};
use vigil_core::{
    reconstruct_state, AuditLog, HealthSample, RegionRole, TracingNotifier,
};
use vigil_engine::{
    command_channel, CommandOutcome, ControllerHandle, FailoverController, HealthMonitor,
    HttpHealthProbe, HttpPromotionAdapter, HttpTrafficDirector, WindowMap,
};
use vigil_persistence::{FileAuditLog, FileLeaseStore};

/// Exit code for a command that is not valid in the current state.
const EXIT_INVALID_STATE: u8 = 1;

/// Exit code for an unreachable external dependency.
pub const EXIT_UNREACHABLE: u8 = 2;

struct Wired {
    handle: ControllerHandle,
    sample_tx: mpsc::UnboundedSender<HealthSample>,
    join: JoinHandle<vigil_core::Result<()>>,
}

/// Builds a controller over the file-backed stores and HTTP adapters and
/// spawns its loop.
async fn wire(settings: &ControllerSettings) -> anyhow::Result<Wired> {
    let audit = FileAuditLog::new(&settings.data_dir)
        .await
        .context("opening audit log")?;
    let lease_store = FileLeaseStore::new(&settings.data_dir)
        .await
        .context("opening lease store")?;
    let promotion = HttpPromotionAdapter::new(&settings.promotion_url, settings.adapter_timeout())?;
    let traffic = HttpTrafficDirector::new(&settings.traffic_url, settings.adapter_timeout())?;

    let (sample_tx, sample_rx) = mpsc::unbounded_channel();
    let (handle, command_rx) = command_channel();

    let controller = FailoverController::new(
        settings.controller_config(),
        settings.primary.endpoint(RegionRole::Writer),
        settings.secondary.endpoint(RegionRole::Replica),
        lease_store,
        promotion,
        traffic,
        audit,
        TracingNotifier::new(),
        sample_rx,
        command_rx,
    )?;
    let join = tokio::spawn(controller.run());

    Ok(Wired {
        handle,
        sample_tx,
        join,
    })
}

fn outcome_exit(outcome: CommandOutcome) -> ExitCode {
    match outcome {
        CommandOutcome::Done => ExitCode::SUCCESS,
        CommandOutcome::InvalidState { state } => {
            error!(%state, "command is not valid in the current state");
            ExitCode::from(EXIT_INVALID_STATE)
        }
        CommandOutcome::DependencyUnreachable { reason } => {
            error!("external dependency unreachable: {}", reason);
            ExitCode::from(EXIT_UNREACHABLE)
        }
    }
}

/// Starts the health monitors and the controller, running until Ctrl-C or a
/// fatal controller error.
pub async fn run(settings: ControllerSettings) -> anyhow::Result<ExitCode> {
    let mut wired = wire(&settings).await?;
    let config = settings.controller_config();

    let probe = Arc::new(HttpHealthProbe::new()?);
    let windows: WindowMap = Arc::new(DashMap::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    for (region, role) in [
        (&settings.primary, RegionRole::Writer),
        (&settings.secondary, RegionRole::Replica),
    ] {
        let monitor = HealthMonitor::new(
            region.endpoint(role),
            Arc::clone(&probe),
            config.probe_interval,
            config.probe_timeout,
            config.window_size,
            Arc::clone(&windows),
            wired.sample_tx.clone(),
        );
        tokio::spawn(monitor.run(shutdown_rx.clone()));
    }
    info!(
        primary = %settings.primary.region_id,
        secondary = %settings.secondary.region_id,
        "vigil controller running"
    );

    tokio::select! {
        result = &mut wired.join => {
            // The controller only stops on its own for fatal conditions.
            let _ = shutdown_tx.send(true);
            result.context("controller task")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            wired.handle.shutdown()?;
            wired.join.await.context("controller task")??;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn one_shot<F, Fut>(settings: ControllerSettings, send: F) -> anyhow::Result<ExitCode>
where
    F: FnOnce(ControllerHandle) -> Fut,
    Fut: std::future::Future<Output = vigil_core::Result<CommandOutcome>>,
{
    let wired = wire(&settings).await?;
    // No monitors in one-shot mode; close the sample channel.
    drop(wired.sample_tx);

    let outcome = send(wired.handle.clone()).await?;
    wired.handle.shutdown()?;
    wired.join.await.context("controller task")??;
    Ok(outcome_exit(outcome))
}

/// Forces a failover evaluation now, bypassing the hysteresis window.
pub async fn trigger(settings: ControllerSettings) -> anyhow::Result<ExitCode> {
    one_shot(settings, |handle| async move { handle.trigger().await }).await
}

/// Releases the current lease and records an abort.
pub async fn abort(settings: ControllerSettings) -> anyhow::Result<ExitCode> {
    one_shot(settings, |handle| async move { handle.abort().await }).await
}

/// Replays the audit log and continues an incomplete failover.
pub async fn resume(settings: ControllerSettings) -> anyhow::Result<ExitCode> {
    one_shot(settings, |handle| async move { handle.resume().await }).await
}

/// Prints the reconstructed state, the latest token's history, and the
/// current lease holder.
pub async fn status(settings: ControllerSettings) -> anyhow::Result<ExitCode> {
    let audit = FileAuditLog::new(&settings.data_dir)
        .await
        .context("opening audit log")?;
    let lease_store = FileLeaseStore::new(&settings.data_dir)
        .await
        .context("opening lease store")?;

    let events = audit.replay(None).await.context("replaying audit log")?;
    let state = reconstruct_state(&events);

    println!("state: {}", state);
    match events.first() {
        Some(first) => println!("fencing token: {}", first.fencing_token),
        None => println!("fencing token: none"),
    }
    match lease_store.current().await.context("reading lease file")? {
        Some(lease) => println!(
            "lease: held by {} (token {}, expires at {})",
            lease.holder, lease.token, lease.expires_at
        ),
        None => println!("lease: none"),
    }
    if !events.is_empty() {
        println!("history:");
        for event in &events {
            println!("  {} {} {}", event.timestamp, event.step, event.detail);
        }
    }
    Ok(ExitCode::SUCCESS)
}
