//! Shared commit/notify machinery for every log store.
//!
//! A store calls [`SnapshotHub::prepare`] to stamp a new entry, persists it,
//! then calls [`SnapshotHub::publish`]. The hub keeps the ordered entries and
//! broadcasts a fresh full [`Snapshot`] on every publish.
//!
//! Stores must serialize prepare → persist → publish (one writer at a time)
//! so that publish order equals timestamp order.
//!
//! Durable stores may be written by other processes too. They feed those
//! commits in through [`SnapshotHub::merge`], which skips ids already held.

use chrono::{DateTime, Utc};
use clonechat_core::entry::{ConversationEntry, EntryId, NewEntry, Snapshot};
use clonechat_core::log::LogSubscription;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

struct HubState {
    entries: Vec<ConversationEntry>,
    ids: HashSet<EntryId>,
    current: Snapshot,
    next_seq: u64,
    last_ts: Option<DateTime<Utc>>,
}

pub struct SnapshotHub {
    state: Mutex<HubState>,
    tx: broadcast::Sender<Snapshot>,
}

impl SnapshotHub {
    /// Start from previously persisted entries (in any order).
    pub fn new(entries: Vec<ConversationEntry>) -> Self {
        let mut ids = HashSet::with_capacity(entries.len());
        let mut entries: Vec<ConversationEntry> =
            entries.into_iter().filter(|e| ids.insert(e.id.clone())).collect();
        entries.sort_by_key(ConversationEntry::order_key);
        let next_seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        let last_ts = entries.iter().map(|e| e.timestamp).max();
        let current: Snapshot = Arc::from(entries.clone());
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);

        Self {
            state: Mutex::new(HubState {
                entries,
                ids,
                current,
                next_seq,
                last_ts,
            }),
            tx,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Assign id, timestamp and sequence number.
    ///
    /// The timestamp never goes backwards, even if the wall clock does.
    pub fn prepare(&self, entry: NewEntry) -> ConversationEntry {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let timestamp = match state.last_ts {
            Some(last) if last > now => last,
            _ => now,
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        state.last_ts = Some(timestamp);

        ConversationEntry {
            id: EntryId::new(),
            text: entry.text,
            sender: entry.sender,
            author_id: entry.author_id,
            timestamp,
            seq,
        }
    }

    /// Record a persisted entry and notify every subscriber.
    ///
    /// The entry's `seq` may have been reassigned by the store; later
    /// `prepare` calls continue after it.
    pub fn publish(&self, entry: ConversationEntry) -> Snapshot {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.insert(entry) {
            Self::broadcast(&mut state, &self.tx)
        } else {
            state.current.clone()
        }
    }

    /// Fold in entries committed elsewhere. Ids already held are ignored;
    /// subscribers get one snapshot if anything was new. Returns the number
    /// of entries added.
    pub fn merge(&self, entries: Vec<ConversationEntry>) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let added = entries
            .into_iter()
            .filter(|entry| state.insert(entry.clone()))
            .count();
        if added > 0 {
            Self::broadcast(&mut state, &self.tx);
        }
        added
    }

    fn broadcast(state: &mut HubState, tx: &broadcast::Sender<Snapshot>) -> Snapshot {
        let snapshot: Snapshot = Arc::from(state.entries.clone());
        state.current = snapshot.clone();
        // No subscribers is fine
        let _ = tx.send(snapshot.clone());
        snapshot
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Capture the current snapshot and the commit feed atomically.
    pub fn subscribe(&self) -> LogSubscription {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        LogSubscription::new(state.current.clone(), self.tx.subscribe())
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HubState {
    /// Insert in order. `false` if the id is already present.
    fn insert(&mut self, entry: ConversationEntry) -> bool {
        if !self.ids.insert(entry.id.clone()) {
            return false;
        }
        self.next_seq = self.next_seq.max(entry.seq + 1);
        if self.last_ts.is_none_or(|last| entry.timestamp > last) {
            self.last_ts = Some(entry.timestamp);
        }

        let key = entry.order_key();
        let pos = self.entries.partition_point(|e| e.order_key() <= key);
        self.entries.insert(pos, entry);
        true
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::empty()
    }
}
