//! SQLite log store.
//!
//! Uses a single table, `conversation_entries`, shared by every collection:
//! - `iid` — integer rowid alias, insertion order across collections
//! - `seq` — per-collection append order, breaks timestamp ties
//!
//! `seq` is assigned inside the `INSERT` itself, so it stays unique per
//! collection when several processes write to one database. Rows committed by
//! other processes are picked up by reading past the highest `iid` seen, on
//! every read, before every append, and periodically by a watcher task.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use clonechat_core::entry::{ConversationEntry, EntryId, NewEntry, Sender, Snapshot};
use clonechat_core::error::LogError;
use clonechat_core::log::{ConversationLog, LogSubscription};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::hub::SnapshotHub;
use crate::DEFAULT_POLL_INTERVAL;

struct Shared {
    pool: SqlitePool,
    collection: String,
    hub: SnapshotHub,
    /// Highest `iid` folded into the hub. Held for the whole of an append.
    cursor: Mutex<i64>,
}

/// A conversation log persisted in SQLite.
pub struct SqliteLog {
    shared: Arc<Shared>,
    watcher: Option<JoinHandle<()>>,
}

impl SqliteLog {
    /// Open (or create) the database at `path` and load `collection`,
    /// watching for other writers every 500ms.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn open(path: &str, collection: impl Into<String>) -> Result<Self, LogError> {
        Self::open_with(path, collection, Some(DEFAULT_POLL_INTERVAL)).await
    }

    /// Open with an explicit watcher period; `None` disables the watcher.
    pub async fn open_with(
        path: &str,
        collection: impl Into<String>,
        poll_interval: Option<Duration>,
    ) -> Result<Self, LogError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| LogError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every in-memory connection is its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| LogError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let log = Self::build(pool, collection.into(), poll_interval).await?;
        info!(collection = %log.shared.collection, "SQLite log initialized at {path}");
        Ok(log)
    }

    /// Create from an existing pool (useful for testing). No watcher runs;
    /// reads and appends still pick up other writers.
    pub async fn from_pool(pool: SqlitePool, collection: impl Into<String>) -> Result<Self, LogError> {
        Self::build(pool, collection.into(), None).await
    }

    async fn build(
        pool: SqlitePool,
        collection: String,
        poll_interval: Option<Duration>,
    ) -> Result<Self, LogError> {
        Self::run_migrations(&pool).await?;
        let shared = Arc::new(Shared {
            pool,
            collection,
            hub: SnapshotHub::empty(),
            cursor: Mutex::new(0),
        });
        let count = shared.refresh().await?;
        debug!(collection = %shared.collection, count, "SQLite log loaded");

        let watcher = poll_interval.map(|every| tokio::spawn(watch(Arc::downgrade(&shared), every)));
        Ok(Self { shared, watcher })
    }

    pub fn collection(&self) -> &str {
        &self.shared.collection
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), LogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_entries (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT UNIQUE NOT NULL,
                collection TEXT NOT NULL,
                seq        INTEGER NOT NULL,
                text       TEXT NOT NULL,
                sender     TEXT NOT NULL,
                author_id  TEXT NOT NULL,
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| LogError::Storage(format!("conversation_entries table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entries_collection_seq ON conversation_entries(collection, seq)",
        )
        .execute(pool)
        .await
        .map_err(|e| LogError::Storage(format!("collection index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `ConversationEntry` from a SQLite row.
    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationEntry, LogError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| LogError::Corrupt(format!("id column: {e}")))?;
        let seq: i64 = row
            .try_get("seq")
            .map_err(|e| LogError::Corrupt(format!("seq column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| LogError::Corrupt(format!("text column: {e}")))?;
        let sender: String = row
            .try_get("sender")
            .map_err(|e| LogError::Corrupt(format!("sender column: {e}")))?;
        let author_id: String = row
            .try_get("author_id")
            .map_err(|e| LogError::Corrupt(format!("author_id column: {e}")))?;
        let timestamp: String = row
            .try_get("timestamp")
            .map_err(|e| LogError::Corrupt(format!("timestamp column: {e}")))?;

        let sender = Sender::from_str(&sender).map_err(LogError::Corrupt)?;
        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LogError::Corrupt(format!("timestamp '{timestamp}': {e}")))?;
        let seq = u64::try_from(seq).map_err(|e| LogError::Corrupt(format!("seq {seq}: {e}")))?;

        Ok(ConversationEntry {
            id: EntryId(id),
            text,
            sender,
            author_id,
            timestamp,
            seq,
        })
    }
}

impl Drop for SqliteLog {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl Shared {
    async fn refresh(&self) -> Result<usize, LogError> {
        let mut cursor = self.cursor.lock().await;
        self.pull(&mut cursor).await
    }

    /// Fold in rows past `cursor`, own rows included (the hub skips those).
    async fn pull(&self, cursor: &mut i64) -> Result<usize, LogError> {
        let rows = sqlx::query(
            "SELECT iid, id, seq, text, sender, author_id, timestamp FROM conversation_entries WHERE collection = ?1 AND iid > ?2 ORDER BY iid",
        )
        .bind(&self.collection)
        .bind(*cursor)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LogError::Unavailable(format!("Failed to load entries: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let iid: i64 = row
                .try_get("iid")
                .map_err(|e| LogError::Corrupt(format!("iid column: {e}")))?;
            entries.push(SqliteLog::row_to_entry(row)?);
            *cursor = (*cursor).max(iid);
        }
        Ok(self.hub.merge(entries))
    }

    async fn append(&self, entry: NewEntry) -> Result<EntryId, LogError> {
        let mut cursor = self.cursor.lock().await;
        self.pull(&mut cursor).await?;

        let mut committed = self.hub.prepare(entry);
        let row = sqlx::query(
            r#"
            INSERT INTO conversation_entries (id, collection, seq, text, sender, author_id, timestamp)
            SELECT ?1, ?2, COALESCE(MAX(seq) + 1, 0), ?3, ?4, ?5, ?6
            FROM conversation_entries WHERE collection = ?2
            RETURNING seq
            "#,
        )
        .bind(committed.id.as_str())
        .bind(&self.collection)
        .bind(&committed.text)
        .bind(committed.sender.as_str())
        .bind(&committed.author_id)
        .bind(committed.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LogError::Storage(format!("Failed to insert entry: {e}")))?;

        let seq: i64 = row
            .try_get("seq")
            .map_err(|e| LogError::Corrupt(format!("seq column: {e}")))?;
        committed.seq =
            u64::try_from(seq).map_err(|e| LogError::Corrupt(format!("seq {seq}: {e}")))?;

        let id = committed.id.clone();
        self.hub.publish(committed);
        Ok(id)
    }
}

async fn watch(shared: Weak<Shared>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        match shared.refresh().await {
            Ok(0) => {}
            Ok(added) => debug!(added, "Picked up external log commits"),
            Err(e) => warn!(error = %e, "SQLite log refresh failed"),
        }
    }
}

#[async_trait]
impl ConversationLog for SqliteLog {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, entry: NewEntry) -> Result<EntryId, LogError> {
        self.shared.append(entry).await
    }

    async fn snapshot(&self) -> Result<Snapshot, LogError> {
        self.shared.refresh().await?;
        Ok(self.shared.hub.snapshot())
    }

    fn subscribe(&self) -> Result<LogSubscription, LogError> {
        Ok(self.shared.hub.subscribe())
    }
}
