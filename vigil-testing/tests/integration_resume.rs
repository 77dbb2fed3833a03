//! Crash recovery: audit replay on startup, the resume command, operator
//! abort, and lease contention between two controllers.

use std::time::Duration;
use vigil_core::{
    AuditLog, ControllerId, FailoverEvent, FailoverState, FailoverStep, FencingToken, LeaseStore,
};
use vigil_engine::CommandOutcome;
use vigil_persistence::InMemoryAuditLog;
use vigil_testing::{
    fast_config, AdapterScript, FailoverHarness, HarnessOptions, InMemoryLeaseStore,
    ScriptedPromotion, SECONDARY,
};

/// Simulates a controller that crashed mid-attempt: acquires a lease so the
/// store's token counter advances, writes the given steps under that token,
/// then drops the lease as an expiry would.
async fn crashed_attempt(
    store: &InMemoryLeaseStore,
    audit: &InMemoryAuditLog,
    steps: &[FailoverStep],
) -> FencingToken {
    let outcome = store
        .acquire("vigil/failover", ControllerId::new(), Duration::from_secs(1))
        .await
        .unwrap();
    let token = match outcome {
        vigil_core::AcquireOutcome::Granted(lease) => lease.token,
        other => panic!("expected grant, got {:?}", other),
    };
    for step in steps {
        audit
            .append(&FailoverEvent::new(token, *step, "pre-crash"))
            .await
            .unwrap();
    }
    store.revoke();
    token
}

#[tokio::test]
async fn resume_after_promotion_skips_straight_to_redirect() {
    let audit = InMemoryAuditLog::new();
    let lease_store = InMemoryLeaseStore::new();
    let old_token = crashed_attempt(
        &lease_store,
        &audit,
        &[
            FailoverStep::LeaseAcquired,
            FailoverStep::PromotionStarted,
            FailoverStep::PromotionDone,
        ],
    )
    .await;

    let harness = FailoverHarness::spawn_with(
        fast_config(),
        HarnessOptions {
            audit,
            lease_store,
            ..Default::default()
        },
    );

    // Startup reconstruction: the log ends after PROMOTION_DONE, so the
    // controller holds at REDIRECTING awaiting an explicit resume.
    let status = harness.handle.status().await.unwrap();
    assert_eq!(status.state, FailoverState::Redirecting);

    let outcome = harness.handle.resume().await.unwrap();
    assert_eq!(outcome, CommandOutcome::Done);

    let status = harness.handle.status().await.unwrap();
    assert_eq!(status.state, FailoverState::FailedOver);

    // The confirmed promotion is not repeated; only the redirect runs.
    assert_eq!(harness.promotion.call_count(), 0);
    assert_eq!(harness.traffic.redirected_to(), Some(SECONDARY.into()));

    // The resumed attempt runs under a fresh, strictly larger token and
    // records its provenance.
    let resumed = harness.audit.replay(None).await.unwrap();
    let new_token = resumed[0].fencing_token;
    assert!(new_token > old_token);
    assert_eq!(resumed[0].step, FailoverStep::LeaseAcquired);
    assert!(resumed[0].detail.contains(&format!("resume of token {}", old_token)));
    assert_eq!(
        resumed.iter().map(|e| e.step).collect::<Vec<_>>(),
        vec![
            FailoverStep::LeaseAcquired,
            FailoverStep::PromotionDone,
            FailoverStep::RedirectStarted,
            FailoverStep::RedirectDone,
            FailoverStep::Completed,
        ]
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn resume_before_promotion_reruns_the_promotion() {
    let audit = InMemoryAuditLog::new();
    let lease_store = InMemoryLeaseStore::new();
    crashed_attempt(
        &lease_store,
        &audit,
        &[FailoverStep::LeaseAcquired, FailoverStep::PromotionStarted],
    )
    .await;

    let harness = FailoverHarness::spawn_with(
        fast_config(),
        HarnessOptions {
            audit,
            lease_store,
            ..Default::default()
        },
    );

    let status = harness.handle.status().await.unwrap();
    assert_eq!(status.state, FailoverState::Promoting);

    let outcome = harness.handle.resume().await.unwrap();
    assert_eq!(outcome, CommandOutcome::Done);

    // Promotion never completed before the crash, so it runs again; the
    // adapter contract makes this safe to repeat.
    assert_eq!(harness.promotion.call_count(), 1);
    assert_eq!(harness.traffic.call_count(), 1);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn resume_with_nothing_incomplete_is_rejected() {
    let harness = FailoverHarness::spawn(fast_config());

    let outcome = harness.handle.resume().await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::InvalidState {
            state: FailoverState::Healthy
        }
    );
    assert_eq!(harness.promotion.call_count(), 0);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn operator_abort_releases_and_records() {
    let audit = InMemoryAuditLog::new();
    let lease_store = InMemoryLeaseStore::new();
    let token = crashed_attempt(
        &lease_store,
        &audit,
        &[FailoverStep::LeaseAcquired, FailoverStep::PromotionStarted],
    )
    .await;

    let harness = FailoverHarness::spawn_with(
        fast_config(),
        HarnessOptions {
            audit,
            lease_store,
            ..Default::default()
        },
    );

    let outcome = harness.handle.abort().await.unwrap();
    assert_eq!(outcome, CommandOutcome::Done);

    let status = harness.handle.status().await.unwrap();
    assert_eq!(status.state, FailoverState::Aborted);

    let last = harness.audit.all_events().pop().unwrap();
    assert_eq!(last.step, FailoverStep::Aborted);
    assert_eq!(last.fencing_token, token);
    assert_eq!(last.detail, "operator abort");

    // Once aborted there is nothing left to resume.
    let outcome = harness.handle.resume().await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::InvalidState {
            state: FailoverState::Aborted
        }
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn abort_without_an_attempt_in_flight_is_rejected() {
    let harness = FailoverHarness::spawn(fast_config());

    let outcome = harness.handle.abort().await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::InvalidState {
            state: FailoverState::Healthy
        }
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn contending_controller_aborts_while_holder_proceeds() {
    let shared_store = InMemoryLeaseStore::new();

    // Controller A wins the lease and then stalls inside promotion.
    let harness_a = FailoverHarness::spawn_with(
        fast_config(),
        HarnessOptions {
            promotion: ScriptedPromotion::with_script(vec![AdapterScript::Hang]),
            lease_store: shared_store.clone(),
            ..Default::default()
        },
    );
    let handle_a = harness_a.handle.clone();
    let trigger_a = tokio::spawn(async move { handle_a.trigger().await });

    while shared_store.current_holder().is_none() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    // Controller B finds the lease busy and must stand down.
    let harness_b = FailoverHarness::spawn_with(
        fast_config(),
        HarnessOptions {
            lease_store: shared_store.clone(),
            ..Default::default()
        },
    );
    let outcome = harness_b.handle.trigger().await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::InvalidState {
            state: FailoverState::Aborted
        }
    );

    let status_b = harness_b.handle.status().await.unwrap();
    assert_eq!(status_b.stats.lease_contentions, 1);
    assert_eq!(harness_b.promotion.call_count(), 0);

    // The losing cycle is recorded under the no-lease sentinel token with
    // the reason for standing down.
    let events_b = harness_b.audit.all_events();
    assert_eq!(events_b.len(), 1);
    assert_eq!(events_b[0].step, FailoverStep::Aborted);
    assert_eq!(events_b[0].fencing_token, FencingToken::NONE);
    assert!(events_b[0].detail.contains("lease busy"));

    // Pull A's lease; its hanging promotion is abandoned.
    shared_store.revoke();
    let outcome_a = trigger_a.await.unwrap().unwrap();
    assert_eq!(
        outcome_a,
        CommandOutcome::InvalidState {
            state: FailoverState::Aborted
        }
    );

    harness_b.shutdown().await.unwrap();
    harness_a.shutdown().await.unwrap();
}
