//! Conversation log trait — ordered, append-only, multi-reader storage.
//!
//! The log owns persisted entries and their order. Readers never receive
//! diffs: every notification is the complete, re-sorted conversation.
//!
//! Implementations: in-memory, JSONL file, SQLite.

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::entry::{EntryId, NewEntry, Snapshot};
use crate::error::LogError;

/// The core ConversationLog trait.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// The backend name (e.g., "memory", "file", "sqlite").
    fn name(&self) -> &str;

    /// Commit a new entry. The store assigns id, timestamp and sequence.
    async fn append(&self, entry: NewEntry) -> Result<EntryId, LogError>;

    /// The current ordered conversation.
    async fn snapshot(&self) -> Result<Snapshot, LogError>;

    /// Start receiving snapshots: first the current one, then one per commit.
    fn subscribe(&self) -> Result<LogSubscription, LogError>;
}

/// A live feed of full snapshots. Dropping it unsubscribes.
pub struct LogSubscription {
    initial: Option<Snapshot>,
    rx: broadcast::Receiver<Snapshot>,
}

impl LogSubscription {
    /// Pair the snapshot current at subscribe time with the commit feed.
    ///
    /// Stores must capture both under the same commit lock so no commit
    /// falls between them.
    pub fn new(initial: Snapshot, rx: broadcast::Receiver<Snapshot>) -> Self {
        Self {
            initial: Some(initial),
            rx,
        }
    }

    /// Wait for the next snapshot. `None` once the store is gone.
    ///
    /// A reader that fell behind jumps to the newest snapshot; since every
    /// snapshot is complete, nothing is lost.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Log subscriber lagged, skipping to latest snapshot");
                    let mut latest = None;
                    loop {
                        match self.rx.try_recv() {
                            Ok(snapshot) => latest = Some(snapshot),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                        }
                    }
                    if let Some(snapshot) = latest {
                        return Some(snapshot);
                    }
                }
            }
        }
    }
}

/// Handle to a callback subscription started by [`subscribe_with`].
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe)) stops
/// delivery.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        // Drop aborts the delivery task.
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Invoke `on_change` with the current snapshot and again after every commit.
///
/// Must be called from within a tokio runtime.
pub fn subscribe_with<F>(
    log: &dyn ConversationLog,
    mut on_change: F,
) -> Result<SubscriptionHandle, LogError>
where
    F: FnMut(Snapshot) + Send + 'static,
{
    let mut subscription = log.subscribe()?;
    let backend = log.name().to_string();
    let task = tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            on_change(snapshot);
        }
        debug!(backend = %backend, "Log subscription closed");
    });
    Ok(SubscriptionHandle { task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ConversationEntry, Sender};
    use chrono::Utc;
    use std::sync::Arc;

    fn snapshot_of(texts: &[&str]) -> Snapshot {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ConversationEntry {
                id: EntryId::new(),
                text: (*t).to_string(),
                sender: Sender::User,
                author_id: "u".into(),
                timestamp: Utc::now(),
                seq: i as u64,
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn initial_snapshot_delivered_first() {
        let (tx, rx) = broadcast::channel(4);
        let mut sub = LogSubscription::new(snapshot_of(&["a"]), rx);
        tx.send(snapshot_of(&["a", "b"])).unwrap();

        assert_eq!(sub.next().await.unwrap().len(), 1);
        assert_eq!(sub.next().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn closed_feed_ends_subscription() {
        let (tx, rx) = broadcast::channel::<Snapshot>(4);
        let mut sub = LogSubscription::new(snapshot_of(&[]), rx);
        drop(tx);

        assert!(sub.next().await.is_some()); // initial
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_to_latest() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = LogSubscription::new(snapshot_of(&[]), rx);
        for n in 1..=5 {
            let texts: Vec<&str> = std::iter::repeat_n("x", n).collect();
            tx.send(snapshot_of(&texts)).unwrap();
        }

        assert_eq!(sub.next().await.unwrap().len(), 0); // initial
        let latest = sub.next().await.unwrap();
        assert_eq!(latest.len(), 5);
    }

    #[tokio::test]
    async fn dropping_handle_stops_delivery() {
        struct FeedOnly {
            tx: broadcast::Sender<Snapshot>,
        }

        #[async_trait]
        impl ConversationLog for FeedOnly {
            fn name(&self) -> &str {
                "feed"
            }
            async fn append(&self, _entry: NewEntry) -> Result<EntryId, LogError> {
                Err(LogError::Rejected("read-only".into()))
            }
            async fn snapshot(&self) -> Result<Snapshot, LogError> {
                Ok(Arc::from(Vec::<ConversationEntry>::new()))
            }
            fn subscribe(&self) -> Result<LogSubscription, LogError> {
                Ok(LogSubscription::new(Arc::from(Vec::<ConversationEntry>::new()), self.tx.subscribe()))
            }
        }

        let (tx, _) = broadcast::channel(8);
        let log = FeedOnly { tx: tx.clone() };
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = subscribe_with(&log, move |snapshot| {
            let _ = seen_tx.send(snapshot.len());
        })
        .unwrap();

        assert_eq!(seen_rx.recv().await, Some(0));
        tx.send(snapshot_of(&["a"])).unwrap();
        assert_eq!(seen_rx.recv().await, Some(1));

        handle.unsubscribe();
        // Once the task is aborted, the callback (and its sender) is dropped.
        assert_eq!(seen_rx.recv().await, None);
    }
}
