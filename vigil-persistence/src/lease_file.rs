use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use vigil_core::{
    now_millis, AcquireOutcome, ControllerId, FailoverError, FailoverLease, FencingToken,
    LeaseStore, RenewOutcome, Result,
};

/// Persisted lease-store state: the token counter survives releases so
/// tokens stay strictly increasing per key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LeaseFileState {
    last_token: u64,
    current: Option<FailoverLease>,
}

/// Single-host, file-backed lease store.
///
/// A reference implementation of the [`LeaseStore`] contract for
/// deployments where all controller instances share a host or a shared
/// filesystem. State is written with the temp-file-then-rename idiom so a
/// crash never leaves a torn record. Production deployments with controllers
/// on separate hosts should back the trait with a strongly consistent store
/// instead.
#[derive(Debug)]
pub struct FileLeaseStore {
    state_path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileLeaseStore {
    /// Create a file-backed lease store under the given directory.
    ///
    /// # Errors
    /// * Returns error if the directory cannot be created
    pub async fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();

        if !data_dir.exists() {
            fs::create_dir_all(data_dir).await.map_err(|e| {
                FailoverError::internal(format!("Failed to create lease directory: {}", e))
            })?;
        }

        Ok(Self {
            state_path: data_dir.join("lease.json"),
            lock: Mutex::new(()),
        })
    }

    async fn load(&self) -> Result<LeaseFileState> {
        if !self.state_path.exists() {
            return Ok(LeaseFileState::default());
        }
        let data = fs::read(&self.state_path)
            .await
            .map_err(|e| FailoverError::internal(format!("Failed to read lease state: {}", e)))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Current lease on disk, if one exists and has not expired. Read-only;
    /// used by the status surface.
    pub async fn current(&self) -> Result<Option<FailoverLease>> {
        let state = self.load().await?;
        Ok(state.current.filter(|l| !l.is_expired_at(now_millis())))
    }

    async fn store(&self, state: &LeaseFileState) -> Result<()> {
        let temp_path = self.state_path.with_extension("tmp");
        let data = serde_json::to_vec(state)?;

        fs::write(&temp_path, data).await.map_err(|e| {
            FailoverError::internal(format!("Failed to write lease temp file: {}", e))
        })?;
        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| FailoverError::internal(format!("Failed to rename lease file: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl LeaseStore for FileLeaseStore {
    async fn acquire(
        &self,
        key: &str,
        holder: ControllerId,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let now = now_millis();

        if let Some(current) = &state.current {
            if current.key == key && !current.is_expired_at(now) {
                return Ok(AcquireOutcome::Busy {
                    holder: Some(current.holder),
                });
            }
        }

        let token = FencingToken::new(state.last_token + 1);
        let lease = FailoverLease {
            key: key.to_string(),
            holder,
            token,
            expires_at: now + ttl.as_millis() as u64,
        };

        state.last_token = token.value();
        state.current = Some(lease.clone());
        self.store(&state).await?;

        Ok(AcquireOutcome::Granted(lease))
    }

    async fn renew(&self, token: FencingToken, ttl: Duration) -> Result<RenewOutcome> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let now = now_millis();

        match &mut state.current {
            Some(current) if current.token == token && !current.is_expired_at(now) => {
                let expires_at = now + ttl.as_millis() as u64;
                current.expires_at = expires_at;
                self.store(&state).await?;
                Ok(RenewOutcome::Renewed { expires_at })
            }
            _ => Ok(RenewOutcome::Lost),
        }
    }

    async fn release(&self, token: FencingToken) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;

        // Releasing a stale token is a no-op.
        if matches!(&state.current, Some(current) if current.token == token) {
            state.current = None;
            self.store(&state).await?;
        }
        Ok(())
    }
}
