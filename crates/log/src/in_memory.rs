//! In-memory log — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use clonechat_core::entry::{EntryId, NewEntry, Snapshot};
use clonechat_core::error::LogError;
use clonechat_core::log::{ConversationLog, LogSubscription};
use tokio::sync::Mutex;

use crate::hub::SnapshotHub;

/// A log that keeps entries only for the lifetime of the process.
pub struct InMemoryLog {
    hub: SnapshotHub,
    write_lock: Mutex<()>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self {
            hub: SnapshotHub::empty(),
            write_lock: Mutex::new(()),
        }
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationLog for InMemoryLog {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, entry: NewEntry) -> Result<EntryId, LogError> {
        let _guard = self.write_lock.lock().await;
        let committed = self.hub.prepare(entry);
        let id = committed.id.clone();
        self.hub.publish(committed);
        Ok(id)
    }

    async fn snapshot(&self) -> Result<Snapshot, LogError> {
        Ok(self.hub.snapshot())
    }

    fn subscribe(&self) -> Result<LogSubscription, LogError> {
        Ok(self.hub.subscribe())
    }
}
