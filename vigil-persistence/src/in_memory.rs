use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use vigil_core::{AuditLog, FailoverEvent, FencingToken, Result};

/// Simple in-memory audit log.
///
/// Suitable for tests and embedded scenarios where history does not need to
/// survive process restarts. Clones share the same underlying log.
#[derive(Debug, Clone)]
pub struct InMemoryAuditLog {
    events: Arc<RwLock<Vec<FailoverEvent>>>,
}

impl InMemoryAuditLog {
    /// Create a new empty in-memory audit log.
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns a copy of every recorded event, in append order.
    pub fn all_events(&self) -> Vec<FailoverEvent> {
        self.events.read().clone()
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, event: &FailoverEvent) -> Result<()> {
        self.events.write().push(event.clone());
        Ok(())
    }

    async fn replay(&self, token: Option<FencingToken>) -> Result<Vec<FailoverEvent>> {
        let events = self.events.read();
        let token = match token {
            Some(token) => Some(token),
            None => events.iter().map(|e| e.fencing_token).max(),
        };
        Ok(match token {
            Some(token) => events
                .iter()
                .filter(|e| e.fencing_token == token)
                .cloned()
                .collect(),
            None => Vec::new(),
        })
    }

    async fn latest_token(&self) -> Result<Option<FencingToken>> {
        Ok(self.events.read().iter().map(|e| e.fencing_token).max())
    }
}
