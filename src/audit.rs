//! Chat audit trail
//!
//! Every resolved user query is recorded: who asked, what they asked, how it
//! was classified and with what confidence. The admin review tooling reads
//! from here.

use crate::models::ChatLogEntry;
use crate::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Audit trail storage
pub struct ChatAuditLog {
    entries: Arc<RwLock<Vec<ChatLogEntry>>>,
}

impl ChatAuditLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Store one resolution record
    pub async fn record(&self, entry: ChatLogEntry) -> Result<Uuid> {
        let log_id = entry.log_id;
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(log_id)
    }

    /// All entries for one account, oldest first
    pub async fn for_account(&self, account_number: &str) -> Result<Vec<ChatLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.account_number == account_number)
            .cloned()
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ChatAuditLog {
    fn default() -> Self {
        Self::new()
    }
}
