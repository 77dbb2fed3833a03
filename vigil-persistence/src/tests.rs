#[cfg(test)]
mod unit_tests {
    use crate::{FileAuditLog, FileLeaseStore, InMemoryAuditLog};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;
    use vigil_core::{
        AcquireOutcome, AuditLog, ControllerId, FailoverError, FailoverEvent, FailoverStep,
        FencingToken, LeaseStore, RenewOutcome,
    };

    fn event(token: u64, step: FailoverStep) -> FailoverEvent {
        FailoverEvent::new(FencingToken::new(token), step, "")
    }

    #[tokio::test]
    async fn in_memory_replay_filters_by_token() {
        let log = InMemoryAuditLog::new();
        log.append(&event(1, FailoverStep::LeaseAcquired)).await.unwrap();
        log.append(&event(1, FailoverStep::Aborted)).await.unwrap();
        log.append(&event(2, FailoverStep::LeaseAcquired)).await.unwrap();

        let first = log.replay(Some(FencingToken::new(1))).await.unwrap();
        assert_eq!(first.len(), 2);

        // None selects the latest token present.
        let latest = log.replay(None).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].fencing_token, FencingToken::new(2));

        assert_eq!(
            log.latest_token().await.unwrap(),
            Some(FencingToken::new(2))
        );
    }

    #[tokio::test]
    async fn in_memory_empty_log() {
        let log = InMemoryAuditLog::new();
        assert!(log.replay(None).await.unwrap().is_empty());
        assert_eq!(log.latest_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_audit_log_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let log = FileAuditLog::new(temp_dir.path()).await.unwrap();
        log.append(&event(3, FailoverStep::LeaseAcquired)).await.unwrap();
        log.append(&event(3, FailoverStep::PromotionStarted)).await.unwrap();
        log.append(&event(3, FailoverStep::PromotionDone)).await.unwrap();

        // A fresh instance over the same directory sees the same history.
        let reopened = FileAuditLog::new(temp_dir.path()).await.unwrap();
        let events = reopened.replay(Some(FencingToken::new(3))).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].step, FailoverStep::PromotionDone);
        assert_eq!(
            reopened.latest_token().await.unwrap(),
            Some(FencingToken::new(3))
        );
    }

    #[tokio::test]
    async fn file_audit_log_detects_corruption() {
        let temp_dir = TempDir::new().unwrap();

        let log = FileAuditLog::new(temp_dir.path()).await.unwrap();
        log.append(&event(1, FailoverStep::LeaseAcquired)).await.unwrap();

        // Flip a byte inside the serialized event payload.
        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        let tampered = contents.replace("LeaseAcquired", "RedirectDone");
        let mut file = tokio::fs::File::create(log.path()).await.unwrap();
        file.write_all(tampered.as_bytes()).await.unwrap();

        let err = log.replay(None).await.unwrap_err();
        assert!(matches!(err, FailoverError::AuditCorruption { .. }));
    }

    #[tokio::test]
    async fn file_lease_store_grants_and_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLeaseStore::new(temp_dir.path()).await.unwrap();
        let ttl = Duration::from_secs(30);

        let a = ControllerId::new();
        let b = ControllerId::new();

        let lease = match store.acquire("vigil/failover", a, ttl).await.unwrap() {
            AcquireOutcome::Granted(lease) => lease,
            AcquireOutcome::Busy { .. } => panic!("fresh store should grant"),
        };
        assert_eq!(lease.token, FencingToken::new(1));

        // Second controller is refused while the lease is valid.
        match store.acquire("vigil/failover", b, ttl).await.unwrap() {
            AcquireOutcome::Busy { holder } => assert_eq!(holder, Some(a)),
            AcquireOutcome::Granted(_) => panic!("lease should be busy"),
        }

        // Renewal extends, release frees, and the next grant gets a
        // strictly larger token.
        assert!(matches!(
            store.renew(lease.token, ttl).await.unwrap(),
            RenewOutcome::Renewed { .. }
        ));
        store.release(lease.token).await.unwrap();

        let lease2 = match store.acquire("vigil/failover", b, ttl).await.unwrap() {
            AcquireOutcome::Granted(lease) => lease,
            AcquireOutcome::Busy { .. } => panic!("released lease should be free"),
        };
        assert!(lease2.token > lease.token);
    }

    #[tokio::test]
    async fn file_lease_store_renew_of_stale_token_is_lost() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLeaseStore::new(temp_dir.path()).await.unwrap();
        let ttl = Duration::from_secs(30);

        let lease = match store
            .acquire("vigil/failover", ControllerId::new(), ttl)
            .await
            .unwrap()
        {
            AcquireOutcome::Granted(lease) => lease,
            AcquireOutcome::Busy { .. } => panic!("fresh store should grant"),
        };
        store.release(lease.token).await.unwrap();

        assert_eq!(
            store.renew(lease.token, ttl).await.unwrap(),
            RenewOutcome::Lost
        );
    }

    #[tokio::test]
    async fn file_lease_store_expired_lease_is_reacquirable() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLeaseStore::new(temp_dir.path()).await.unwrap();

        let a = ControllerId::new();
        let b = ControllerId::new();

        let lease = match store
            .acquire("vigil/failover", a, Duration::from_millis(10))
            .await
            .unwrap()
        {
            AcquireOutcome::Granted(lease) => lease,
            AcquireOutcome::Busy { .. } => panic!("fresh store should grant"),
        };

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Expired: a new holder gets a fresh, larger token and the old
        // holder's renewal reports loss.
        let lease2 = match store
            .acquire("vigil/failover", b, Duration::from_secs(30))
            .await
            .unwrap()
        {
            AcquireOutcome::Granted(lease) => lease,
            AcquireOutcome::Busy { .. } => panic!("expired lease should be free"),
        };
        assert!(lease2.token > lease.token);
        assert_eq!(
            store
                .renew(lease.token, Duration::from_secs(30))
                .await
                .unwrap(),
            RenewOutcome::Lost
        );
    }
}
