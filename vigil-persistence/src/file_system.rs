use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use vigil_core::{AuditLog, FailoverError, FailoverEvent, FencingToken, Result};

use serde::{Deserialize, Serialize};

/// On-disk framing for one audit record: the event plus a CRC32 of its
/// serialized bytes, verified on replay.
#[derive(Debug, Serialize, Deserialize)]
struct AuditRecord {
    crc: u32,
    event: FailoverEvent,
}

/// Append-only, checksummed file audit log.
///
/// Events are stored one JSON record per line. Every append is flushed and
/// fsynced before it returns, so a `PromotionDone` acknowledged by this log
/// is durable by the time the state machine enters `Redirecting`.
#[derive(Debug)]
pub struct FileAuditLog {
    log_path: PathBuf,
    // Serializes appends so concurrent steps cannot interleave partial lines.
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    /// Create a file audit log under the given directory.
    ///
    /// # Errors
    /// * Returns error if the directory cannot be created
    pub async fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();

        if !data_dir.exists() {
            fs::create_dir_all(data_dir).await.map_err(|e| {
                FailoverError::audit(format!("Failed to create audit directory: {}", e))
            })?;
        }

        Ok(Self {
            log_path: data_dir.join("audit.log"),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    async fn read_all(&self) -> Result<Vec<FailoverEvent>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.log_path)
            .await
            .map_err(|e| FailoverError::audit(format!("Failed to read audit log: {}", e)))?;

        let mut events = Vec::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            let record: AuditRecord = serde_json::from_str(line)
                .map_err(|e| FailoverError::audit(format!("Malformed audit record: {}", e)))?;
            let actual = crc32fast::hash(&serde_json::to_vec(&record.event)?);
            if actual != record.crc {
                return Err(FailoverError::AuditCorruption {
                    expected: record.crc,
                    actual,
                });
            }
            events.push(record.event);
        }
        Ok(events)
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, event: &FailoverEvent) -> Result<()> {
        let record = AuditRecord {
            crc: crc32fast::hash(&serde_json::to_vec(event)?),
            event: event.clone(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .map_err(|e| FailoverError::audit(format!("Failed to open audit log: {}", e)))?;

        file.write_all(&line)
            .await
            .map_err(|e| FailoverError::audit(format!("Failed to append audit record: {}", e)))?;
        file.sync_data()
            .await
            .map_err(|e| FailoverError::audit(format!("Failed to fsync audit log: {}", e)))?;

        Ok(())
    }

    async fn replay(&self, token: Option<FencingToken>) -> Result<Vec<FailoverEvent>> {
        let events = self.read_all().await?;
        let token = match token {
            Some(token) => Some(token),
            None => events.iter().map(|e| e.fencing_token).max(),
        };
        Ok(match token {
            Some(token) => events
                .into_iter()
                .filter(|e| e.fencing_token == token)
                .collect(),
            None => Vec::new(),
        })
    }

    async fn latest_token(&self) -> Result<Option<FencingToken>> {
        let events = self.read_all().await?;
        Ok(events.iter().map(|e| e.fencing_token).max())
    }
}
