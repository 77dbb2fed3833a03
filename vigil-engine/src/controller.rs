//! The failover state machine.
//!
//! The controller consumes health samples, acquires and renews the failover
//! lease, invokes promotion and then traffic redirect in a fixed order,
//! appends to the audit log at every step, and emits notifications. All
//! state transitions execute on a single serialized loop: one consumer over
//! the sample channel and the admin command channel, so transitions stay
//! linear and race-free. Redirect is only ever issued from `Redirecting`,
//! which is only entered after `PromotionDone` has been durably appended;
//! traffic is never repointed without a confirmed promotion.

use crate::BackoffPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vigil_core::{
    now_millis, promotion_recorded, reconstruct_state, AcquireOutcome, AuditLog, ControllerConfig,
    ControllerId, EventSummary, FailoverError, FailoverEvent, FailoverLease, FailoverState,
    FailoverStep, FencingToken, HealthSample, LeaseStore, Notifier, PromotionAdapter,
    RegionEndpoint, RegionRole, RenewOutcome, Result, Severity, TrafficDirector,
};

/// Bounded retries for the audit append itself; the underlying action is
/// never retried this way since it may already have taken effect.
const AUDIT_APPEND_RETRIES: u32 = 3;

/// Administrative commands accepted by the controller loop.
pub enum ControllerCommand {
    /// Force an evaluation now, bypassing the hysteresis threshold.
    Trigger(oneshot::Sender<CommandOutcome>),

    /// Release the current lease and transition to `Aborted`.
    Abort(oneshot::Sender<CommandOutcome>),

    /// Replay the audit log and continue from the last incomplete step.
    Resume(oneshot::Sender<CommandOutcome>),

    /// Report current state, lease, and statistics.
    Status(oneshot::Sender<StatusReport>),

    /// Stop the controller loop.
    Shutdown,
}

/// Outcome of an administrative command, mapped onto process exit codes by
/// the ctl binary: 0 success, 1 invalid state, 2 dependency unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    InvalidState { state: FailoverState },
    DependencyUnreachable { reason: String },
}

/// Counters for the controller's externally observable behavior.
#[derive(Debug, Default, Clone)]
pub struct ControllerStats {
    pub samples_observed: u64,
    pub failovers_started: u64,
    pub failovers_completed: u64,
    pub failovers_aborted: u64,
    pub lease_contentions: u64,
    pub promotion_retries: u64,
    pub redirect_retries: u64,
    pub notifications_failed: u64,
}

/// Snapshot returned by the `status` command.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state: FailoverState,
    pub lease: Option<FailoverLease>,
    pub primary: RegionEndpoint,
    pub secondary: RegionEndpoint,
    pub last_sample: Option<HealthSample>,
    pub consecutive_unhealthy: u32,
    pub stats: ControllerStats,
}

/// Cloneable handle for sending administrative commands to a running
/// controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControllerCommand>,
}

/// Creates the command channel: a handle for callers and the receiver the
/// controller consumes.
pub fn command_channel() -> (ControllerHandle, mpsc::UnboundedReceiver<ControllerCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControllerHandle { tx }, rx)
}

impl ControllerHandle {
    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> ControllerCommand,
    ) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| FailoverError::internal("controller stopped"))?;
        reply_rx
            .await
            .map_err(|_| FailoverError::internal("controller dropped command reply"))
    }

    pub async fn status(&self) -> Result<StatusReport> {
        self.request(ControllerCommand::Status).await
    }

    pub async fn trigger(&self) -> Result<CommandOutcome> {
        self.request(ControllerCommand::Trigger).await
    }

    pub async fn abort(&self) -> Result<CommandOutcome> {
        self.request(ControllerCommand::Abort).await
    }

    pub async fn resume(&self) -> Result<CommandOutcome> {
        self.request(ControllerCommand::Resume).await
    }

    pub fn shutdown(&self) -> Result<()> {
        self.tx
            .send(ControllerCommand::Shutdown)
            .map_err(|_| FailoverError::internal("controller stopped"))
    }
}

/// How a failover attempt started, used to map command replies.
enum AttemptStart {
    Started,
    Busy,
    Unreachable(String),
}

/// The orchestration core: a single-consumer state machine over health
/// samples and administrative commands.
pub struct FailoverController<L, P, T, A, N>
where
    L: LeaseStore + 'static,
    P: PromotionAdapter + 'static,
    T: TrafficDirector + 'static,
    A: AuditLog + 'static,
    N: Notifier + 'static,
{
    id: ControllerId,
    config: ControllerConfig,
    backoff: BackoffPolicy,
    primary: RegionEndpoint,
    secondary: RegionEndpoint,
    lease_store: Arc<L>,
    promotion: Arc<P>,
    traffic: Arc<T>,
    audit: Arc<A>,
    notifier: Arc<N>,
    state: FailoverState,
    lease: Option<FailoverLease>,
    last_sample: Option<HealthSample>,
    consecutive_unhealthy: u32,
    stats: ControllerStats,
    sample_rx: mpsc::UnboundedReceiver<HealthSample>,
    command_rx: mpsc::UnboundedReceiver<ControllerCommand>,
}

impl<L, P, T, A, N> FailoverController<L, P, T, A, N>
where
    L: LeaseStore + 'static,
    P: PromotionAdapter + 'static,
    T: TrafficDirector + 'static,
    A: AuditLog + 'static,
    N: Notifier + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ControllerConfig,
        primary: RegionEndpoint,
        secondary: RegionEndpoint,
        lease_store: L,
        promotion: P,
        traffic: T,
        audit: A,
        notifier: N,
        sample_rx: mpsc::UnboundedReceiver<HealthSample>,
        command_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: ControllerId::new(),
            backoff: BackoffPolicy::from_config(&config),
            config,
            primary,
            secondary,
            lease_store: Arc::new(lease_store),
            promotion: Arc::new(promotion),
            traffic: Arc::new(traffic),
            audit: Arc::new(audit),
            notifier: Arc::new(notifier),
            state: FailoverState::Healthy,
            lease: None,
            last_sample: None,
            consecutive_unhealthy: 0,
            stats: ControllerStats::default(),
            sample_rx,
            command_rx,
        })
    }

    /// Identity of this controller instance.
    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Runs the serialized evaluation loop until shutdown.
    ///
    /// Returns an error only for conditions that are fatal to the process,
    /// such as an audit log that cannot durably record events.
    pub async fn run(mut self) -> Result<()> {
        info!(controller = %self.id, "starting failover controller");
        self.initialize().await?;

        let mut samples_closed = false;
        loop {
            tokio::select! {
                sample = self.sample_rx.recv(), if !samples_closed => {
                    match sample {
                        Some(sample) => self.handle_sample(sample).await?,
                        None => samples_closed = true,
                    }
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command).await? {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        info!(controller = %self.id, "failover controller stopped");
        Ok(())
    }

    /// Reconstructs state from the audit log; the log, not memory, is the
    /// startup source of truth.
    async fn initialize(&mut self) -> Result<()> {
        let events = self.audit.replay(None).await?;
        let reconstructed = reconstruct_state(&events);

        self.state = match reconstructed {
            FailoverState::Promoting | FailoverState::Redirecting => {
                warn!(
                    state = %reconstructed,
                    "incomplete failover attempt found in audit log; awaiting resume"
                );
                reconstructed
            }
            FailoverState::FailedOver => FailoverState::FailedOver,
            _ => FailoverState::Healthy,
        };

        info!(controller = %self.id, state = %self.state, "controller initialized");
        Ok(())
    }

    async fn handle_sample(&mut self, sample: HealthSample) -> Result<()> {
        self.stats.samples_observed += 1;

        // Only the primary's health drives transitions.
        if sample.region_id != self.primary.region_id {
            return Ok(());
        }

        if sample.healthy {
            self.consecutive_unhealthy = 0;
        } else {
            self.consecutive_unhealthy += 1;
        }
        self.last_sample = Some(sample.clone());

        let threshold = self.config.unhealthy_sample_threshold;
        match self.state {
            FailoverState::Healthy => {
                if !sample.healthy {
                    debug!(region = %sample.region_id, "unhealthy sample, entering SUSPECTED");
                    self.state = FailoverState::Suspected;
                    if self.consecutive_unhealthy >= threshold {
                        self.begin_failover().await?;
                    }
                }
            }
            FailoverState::Suspected => {
                if sample.healthy {
                    // Free transition: no lease has been requested yet.
                    debug!(region = %sample.region_id, "healthy sample, back to HEALTHY");
                    self.state = FailoverState::Healthy;
                } else if self.consecutive_unhealthy >= threshold {
                    self.begin_failover().await?;
                }
            }
            FailoverState::Aborted => {
                // Terminal for the previous token; a new detection cycle
                // starts on the next tick.
                if sample.healthy {
                    self.state = FailoverState::Healthy;
                } else if self.consecutive_unhealthy >= threshold {
                    self.begin_failover().await?;
                } else {
                    self.state = FailoverState::Suspected;
                }
            }
            // Awaiting resume, failed over, or recovering: samples are
            // recorded but do not drive transitions.
            _ => {}
        }

        Ok(())
    }

    /// Returns `Ok(false)` when the loop should stop.
    async fn handle_command(&mut self, command: ControllerCommand) -> Result<bool> {
        match command {
            ControllerCommand::Status(reply) => {
                let _ = reply.send(StatusReport {
                    state: self.state,
                    lease: self.lease.clone(),
                    primary: self.primary.clone(),
                    secondary: self.secondary.clone(),
                    last_sample: self.last_sample.clone(),
                    consecutive_unhealthy: self.consecutive_unhealthy,
                    stats: self.stats.clone(),
                });
            }
            ControllerCommand::Trigger(reply) => {
                let outcome = self.handle_trigger().await?;
                let _ = reply.send(outcome);
            }
            ControllerCommand::Abort(reply) => {
                let outcome = self.handle_abort().await?;
                let _ = reply.send(outcome);
            }
            ControllerCommand::Resume(reply) => {
                let outcome = self.handle_resume().await?;
                let _ = reply.send(outcome);
            }
            ControllerCommand::Shutdown => {
                if let Some(lease) = self.lease.take() {
                    self.release_lease(lease.token).await;
                }
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn handle_trigger(&mut self) -> Result<CommandOutcome> {
        match self.state {
            FailoverState::Healthy | FailoverState::Suspected | FailoverState::Aborted => {
                match self.begin_failover().await? {
                    AttemptStart::Unreachable(reason) => {
                        Ok(CommandOutcome::DependencyUnreachable { reason })
                    }
                    AttemptStart::Busy => Ok(CommandOutcome::InvalidState { state: self.state }),
                    AttemptStart::Started => {
                        if self.state == FailoverState::FailedOver {
                            Ok(CommandOutcome::Done)
                        } else {
                            Ok(CommandOutcome::InvalidState { state: self.state })
                        }
                    }
                }
            }
            state => Ok(CommandOutcome::InvalidState { state }),
        }
    }

    async fn handle_abort(&mut self) -> Result<CommandOutcome> {
        match self.state {
            FailoverState::LockAcquiring
            | FailoverState::Promoting
            | FailoverState::Redirecting => {
                // A crashed predecessor's lease may still be live; releasing
                // a stale token is a no-op on the store side.
                let token = match self.lease.take() {
                    Some(lease) => Some(lease.token),
                    None => self.audit.latest_token().await?,
                };
                if let Some(token) = token {
                    self.release_lease(token).await;
                    self.append_with_retry(FailoverEvent::new(
                        token,
                        FailoverStep::Aborted,
                        "operator abort",
                    ))
                    .await?;
                }
                self.state = FailoverState::Aborted;
                self.stats.failovers_aborted += 1;
                self.notify(Severity::Warning, "failover aborted by operator")
                    .await;
                Ok(CommandOutcome::Done)
            }
            state => Ok(CommandOutcome::InvalidState { state }),
        }
    }

    async fn handle_resume(&mut self) -> Result<CommandOutcome> {
        let events = match self.audit.replay(None).await {
            Ok(events) => events,
            Err(e) => {
                return Ok(CommandOutcome::DependencyUnreachable {
                    reason: e.to_string(),
                })
            }
        };
        let reconstructed = reconstruct_state(&events);

        match reconstructed {
            FailoverState::Promoting | FailoverState::Redirecting => {
                let resumed_token = events
                    .last()
                    .map(|e| e.fencing_token)
                    .unwrap_or(FencingToken::NONE);
                let skip_promotion = promotion_recorded(&events);

                let lease = match self
                    .lease_store
                    .acquire(&self.config.lease_key, self.id, self.config.lease_ttl)
                    .await
                {
                    Ok(AcquireOutcome::Granted(lease)) => lease,
                    Ok(AcquireOutcome::Busy { holder }) => {
                        info!(?holder, "cannot resume, lease held elsewhere");
                        return Ok(CommandOutcome::InvalidState { state: self.state });
                    }
                    Err(e) => {
                        return Ok(CommandOutcome::DependencyUnreachable {
                            reason: e.to_string(),
                        })
                    }
                };

                info!(
                    token = %lease.token,
                    resumed = %resumed_token,
                    skip_promotion,
                    "resuming incomplete failover"
                );
                self.append_with_retry(FailoverEvent::new(
                    lease.token,
                    FailoverStep::LeaseAcquired,
                    format!("resume of token {}", resumed_token),
                ))
                .await?;
                self.stats.failovers_started += 1;
                if skip_promotion {
                    // Promotion was already durably confirmed under the
                    // resumed token; carry it forward so this token's
                    // sequence still shows promotion before redirect.
                    self.append_with_retry(FailoverEvent::new(
                        lease.token,
                        FailoverStep::PromotionDone,
                        format!("carried from token {}", resumed_token),
                    ))
                    .await?;
                    self.secondary.role = RegionRole::Writer;
                    self.primary.role = RegionRole::Replica;
                    self.state = FailoverState::Redirecting;
                } else {
                    self.state = FailoverState::Promoting;
                }
                self.lease = Some(lease.clone());
                self.run_attempt(lease, skip_promotion).await?;
                self.lease = None;

                if self.state == FailoverState::FailedOver {
                    Ok(CommandOutcome::Done)
                } else {
                    Ok(CommandOutcome::InvalidState { state: self.state })
                }
            }
            state => Ok(CommandOutcome::InvalidState { state }),
        }
    }

    /// Acquires the lease and, if granted, drives the attempt to a terminal
    /// state for its token.
    async fn begin_failover(&mut self) -> Result<AttemptStart> {
        self.state = FailoverState::LockAcquiring;
        info!(controller = %self.id, "unhealthy window confirmed, acquiring failover lease");

        let outcome = self
            .lease_store
            .acquire(&self.config.lease_key, self.id, self.config.lease_ttl)
            .await;

        let lease = match outcome {
            Err(e) => {
                warn!("lease store unreachable: {}", e);
                self.state = FailoverState::Aborted;
                self.notify(Severity::Warning, format!("lease store unreachable: {}", e))
                    .await;
                return Ok(AttemptStart::Unreachable(e.to_string()));
            }
            Ok(AcquireOutcome::Busy { holder }) => {
                // Normal concurrent-controller outcome, not an error.
                info!(?holder, "failover lease busy, aborting this cycle");
                self.stats.lease_contentions += 1;
                self.append_with_retry(FailoverEvent::new(
                    FencingToken::NONE,
                    FailoverStep::Aborted,
                    match holder {
                        Some(holder) => format!("lease busy, held by {}", holder),
                        None => "lease busy".to_string(),
                    },
                ))
                .await?;
                self.state = FailoverState::Aborted;
                return Ok(AttemptStart::Busy);
            }
            Ok(AcquireOutcome::Granted(lease)) => lease,
        };

        self.append_with_retry(FailoverEvent::new(
            lease.token,
            FailoverStep::LeaseAcquired,
            format!("holder {}", self.id),
        ))
        .await?;
        self.stats.failovers_started += 1;
        self.state = FailoverState::Promoting;
        self.notify(
            Severity::Info,
            format!("failover started with fencing token {}", lease.token),
        )
        .await;

        self.lease = Some(lease.clone());
        self.run_attempt(lease, false).await?;
        self.lease = None;
        Ok(AttemptStart::Started)
    }

    /// Drives promotion then redirect under a renewed lease. Every adapter
    /// call is fenced: the token is checked immediately before and after the
    /// call, and a result that arrives after the lease was lost is
    /// discarded.
    async fn run_attempt(&mut self, lease: FailoverLease, skip_promotion: bool) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (lost_tx, mut lost_rx) = watch::channel(false);
        let renewal = spawn_renewal(
            Arc::clone(&self.lease_store),
            lease.clone(),
            self.config.lease_ttl,
            self.config.lease_renew_interval,
            lost_tx,
            stop_rx,
        );

        let outcome = self.drive_steps(&lease, skip_promotion, &mut lost_rx).await;

        let _ = stop_tx.send(true);
        let _ = renewal.await;
        outcome
    }

    async fn drive_steps(
        &mut self,
        lease: &FailoverLease,
        skip_promotion: bool,
        lost_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let token = lease.token;

        if !skip_promotion {
            let target = self.secondary.region_id.clone();
            let mut attempt: u32 = 0;
            loop {
                attempt += 1;
                if *lost_rx.borrow() {
                    return self.abort_lease_lost(token).await;
                }

                self.append_with_retry(FailoverEvent::new(
                    token,
                    FailoverStep::PromotionStarted,
                    format!("attempt {}", attempt),
                ))
                .await?;
                if attempt > 1 {
                    self.stats.promotion_retries += 1;
                }

                let call = tokio::select! {
                    result = self.promotion.promote(&target, token) => Some(result),
                    _ = lost_rx.changed() => None,
                };

                // Fencing check after the call: a result earned under a lost
                // lease is discarded, whatever it says.
                if *lost_rx.borrow() {
                    if call.is_some() {
                        warn!(token = %token, "discarding promotion result, lease lost mid-call");
                    }
                    return self.abort_lease_lost(token).await;
                }
                let result = match call {
                    Some(result) => result,
                    None => return self.abort_lease_lost(token).await,
                };

                match result {
                    Ok(outcome) => {
                        self.append_with_retry(FailoverEvent::new(
                            token,
                            FailoverStep::PromotionDone,
                            format!("new_role_confirmed={}", outcome.new_role_confirmed),
                        ))
                        .await?;
                        // Role flips exactly once, only after confirmed
                        // promotion.
                        self.secondary.role = RegionRole::Writer;
                        self.primary.role = RegionRole::Replica;
                        self.state = FailoverState::Redirecting;
                        self.notify(
                            Severity::Info,
                            format!("promotion of {} confirmed", target),
                        )
                        .await;
                        break;
                    }
                    Err(e) if e.is_retryable() && self.backoff.allows_retry(attempt) => {
                        let delay = self.backoff.delay(attempt);
                        warn!(
                            token = %token,
                            attempt,
                            "promotion attempt failed ({}), retrying in {:?}",
                            e,
                            delay
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = lost_rx.changed() => {}
                        }
                    }
                    Err(e) => {
                        return self
                            .fail_step(token, FailoverStep::PromotionFailed, e.to_string())
                            .await;
                    }
                }
            }
        }

        // Redirect runs only after PromotionDone is durably recorded, with
        // its own retry budget: a crash between the two steps must not force
        // re-promotion.
        let target = self.secondary.region_id.clone();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if *lost_rx.borrow() {
                return self.abort_lease_lost(token).await;
            }

            self.append_with_retry(FailoverEvent::new(
                token,
                FailoverStep::RedirectStarted,
                format!("attempt {}", attempt),
            ))
            .await?;
            if attempt > 1 {
                self.stats.redirect_retries += 1;
            }

            let call = tokio::select! {
                result = self.traffic.redirect(&target, token) => Some(result),
                _ = lost_rx.changed() => None,
            };

            if *lost_rx.borrow() {
                if call.is_some() {
                    warn!(token = %token, "discarding redirect result, lease lost mid-call");
                }
                return self.abort_lease_lost(token).await;
            }
            let result = match call {
                Some(result) => result,
                None => return self.abort_lease_lost(token).await,
            };

            match result {
                Ok(()) => {
                    self.append_with_retry(FailoverEvent::new(
                        token,
                        FailoverStep::RedirectDone,
                        format!("target {}", target),
                    ))
                    .await?;
                    self.append_with_retry(FailoverEvent::new(
                        token,
                        FailoverStep::Completed,
                        "",
                    ))
                    .await?;
                    self.state = FailoverState::FailedOver;
                    self.stats.failovers_completed += 1;
                    self.release_lease(token).await;
                    self.notify(
                        Severity::Info,
                        format!("failover to {} complete", target),
                    )
                    .await;
                    return Ok(());
                }
                Err(e) if e.is_retryable() && self.backoff.allows_retry(attempt) => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        token = %token,
                        attempt,
                        "redirect attempt failed ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = lost_rx.changed() => {}
                    }
                }
                Err(e) => {
                    return self
                        .fail_step(token, FailoverStep::RedirectFailed, e.to_string())
                        .await;
                }
            }
        }
    }

    /// Terminal step failure: the one case that must reach a human.
    async fn fail_step(
        &mut self,
        token: FencingToken,
        step: FailoverStep,
        reason: String,
    ) -> Result<()> {
        error!(token = %token, step = %step, "step failed terminally: {}", reason);
        self.append_with_retry(FailoverEvent::new(token, step, reason.clone()))
            .await?;
        self.state = FailoverState::Aborted;
        self.stats.failovers_aborted += 1;
        self.release_lease(token).await;
        self.notify(
            Severity::Critical,
            format!("failover aborted: {} ({})", step, reason),
        )
        .await;
        Ok(())
    }

    async fn abort_lease_lost(&mut self, token: FencingToken) -> Result<()> {
        warn!(token = %token, "lease lost mid-operation, aborting attempt");
        self.append_with_retry(FailoverEvent::new(
            token,
            FailoverStep::Aborted,
            "lease lost",
        ))
        .await?;
        self.state = FailoverState::Aborted;
        self.stats.failovers_aborted += 1;
        self.notify(Severity::Warning, "lease lost mid-operation").await;
        Ok(())
    }

    async fn release_lease(&mut self, token: FencingToken) {
        // Release failure is tolerable: the lease expires on its own.
        if let Err(e) = self.lease_store.release(token).await {
            warn!(token = %token, "failed to release lease: {}", e);
        }
    }

    /// Appends with bounded retries of the append itself. Persistent
    /// failure is fatal to the controller process, which must not proceed
    /// without durable history.
    async fn append_with_retry(&mut self, event: FailoverEvent) -> Result<()> {
        let mut last_err = None;
        for attempt in 1..=AUDIT_APPEND_RETRIES {
            match self.audit.append(&event).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, "audit append failed: {}", e);
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
            }
        }
        error!("audit log unavailable, controller cannot proceed safely");
        Err(last_err.unwrap_or_else(|| FailoverError::audit("append failed")))
    }

    async fn notify(&mut self, severity: Severity, message: impl Into<String>) {
        let token = self
            .lease
            .as_ref()
            .map(|l| l.token)
            .unwrap_or(FencingToken::NONE);
        let summary = EventSummary::new(severity, self.state, token, message);
        // Best effort: notification is not on the safety-critical path.
        if let Err(e) = self.notifier.publish(&summary).await {
            self.stats.notifications_failed += 1;
            warn!("notifier publish failed: {}", e);
        }
    }
}

/// Renews the lease on a fixed interval while an attempt is in flight.
/// Failing to renew before expiry is treated identically to an explicit
/// loss notification.
fn spawn_renewal<L: LeaseStore + 'static>(
    store: Arc<L>,
    lease: FailoverLease,
    ttl: Duration,
    every: Duration,
    lost_tx: watch::Sender<bool>,
    mut stop_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut expires_at = lease.expires_at;
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately; skip it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match store.renew(lease.token, ttl).await {
                        Ok(RenewOutcome::Renewed { expires_at: extended }) => {
                            expires_at = extended;
                        }
                        Ok(RenewOutcome::Lost) => {
                            let _ = lost_tx.send(true);
                            break;
                        }
                        Err(e) => {
                            warn!(token = %lease.token, "lease renewal error: {}", e);
                            if now_millis() >= expires_at {
                                let _ = lost_tx.send(true);
                                break;
                            }
                        }
                    }
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
