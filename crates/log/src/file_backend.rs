//! File-based log — persistent JSON-lines storage.
//!
//! Each line is one committed entry tagged with its collection. Several
//! processes may share one file:
//! - appends hold an exclusive `fs2` lock on the file, first fold in every
//!   line written since the last read, then write, so `seq` stays unique per
//!   collection
//! - reads and the background watcher tail the file from the last consumed
//!   byte offset
//!
//! Only complete lines are consumed. Lines that fail to parse are skipped
//! with a warning.
//!
//! Default location: `~/.clonechat/chat_history.jsonl`

use async_trait::async_trait;
use clonechat_core::entry::{ConversationEntry, EntryId, NewEntry, Snapshot};
use clonechat_core::error::LogError;
use clonechat_core::log::{ConversationLog, LogSubscription};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::hub::SnapshotHub;
use crate::DEFAULT_POLL_INTERVAL;

/// One JSONL line.
#[derive(Serialize, Deserialize)]
struct StoredLine {
    collection: String,
    #[serde(flatten)]
    entry: ConversationEntry,
}

struct Shared {
    path: PathBuf,
    collection: String,
    hub: SnapshotHub,
    /// Bytes of the file already folded into the hub. Held for the whole of
    /// an append, so it also serializes writers within the process.
    offset: Mutex<u64>,
}

/// A JSONL-backed conversation log scoped to one collection.
pub struct FileLog {
    shared: Arc<Shared>,
    watcher: Option<JoinHandle<()>>,
}

impl FileLog {
    /// Open the log at `path`, watching for other writers every 500ms.
    ///
    /// A missing file starts empty; it is created on first append.
    pub fn open(path: impl Into<PathBuf>, collection: impl Into<String>) -> Result<Self, LogError> {
        Self::open_with(path, collection, Some(DEFAULT_POLL_INTERVAL))
    }

    /// Open with an explicit watcher period; `None` disables the watcher.
    ///
    /// The watcher only starts when called inside a tokio runtime.
    pub fn open_with(
        path: impl Into<PathBuf>,
        collection: impl Into<String>,
        poll_interval: Option<Duration>,
    ) -> Result<Self, LogError> {
        let shared = Arc::new(Shared {
            path: path.into(),
            collection: collection.into(),
            hub: SnapshotHub::empty(),
            offset: Mutex::new(0),
        });
        let count = shared.refresh()?;
        debug!(
            path = %shared.path.display(),
            collection = %shared.collection,
            count,
            "File log loaded"
        );

        let watcher = poll_interval.and_then(|every| {
            let runtime = tokio::runtime::Handle::try_current().ok()?;
            Some(runtime.spawn(watch(Arc::downgrade(&shared), every)))
        });

        Ok(Self { shared, watcher })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn collection(&self) -> &str {
        &self.shared.collection
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, LogError>
    where
        T: Send + 'static,
        F: FnOnce(&Shared) -> Result<T, LogError> + Send + 'static,
    {
        let shared = self.shared.clone();
        tokio::task::spawn_blocking(move || op(shared.as_ref()))
            .await
            .map_err(|e| LogError::Storage(format!("Log file task failed: {e}")))?
    }
}

impl Drop for FileLog {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl Shared {
    /// Fold in everything appended since the last read.
    fn refresh(&self) -> Result<usize, LogError> {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.tail(&mut offset)
    }

    fn tail(&self, offset: &mut u64) -> Result<usize, LogError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(LogError::Unavailable(format!(
                    "Failed to read log file {}: {e}",
                    self.path.display()
                )));
            }
        };

        let len = file
            .metadata()
            .map_err(|e| LogError::Unavailable(format!("Failed to stat log file: {e}")))?
            .len();
        if len == *offset {
            return Ok(0);
        }
        if len < *offset {
            warn!(path = %self.path.display(), "Log file shrank, rereading from the start");
            *offset = 0;
        }

        let mut buf = Vec::new();
        file.seek(SeekFrom::Start(*offset))
            .and_then(|_| file.read_to_end(&mut buf))
            .map_err(|e| LogError::Unavailable(format!("Failed to read log file: {e}")))?;

        // A line without its newline is still being written.
        let Some(end) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(0);
        };
        *offset += end as u64 + 1;

        let entries: Vec<ConversationEntry> = String::from_utf8_lossy(&buf[..end])
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<StoredLine>(line) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted log line");
                    None
                }
            })
            .filter(|stored| stored.collection == self.collection)
            .map(|stored| stored.entry)
            .collect();

        Ok(self.hub.merge(entries))
    }

    fn append(&self, entry: NewEntry) -> Result<EntryId, LogError> {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| LogError::Storage(format!("Failed to create log directory: {e}")))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LogError::Unavailable(format!("Failed to open log file: {e}")))?;
        file.lock_exclusive()
            .map_err(|e| LogError::Unavailable(format!("Failed to lock log file: {e}")))?;

        let written = self.write_locked(&mut file, &mut offset, entry);
        let _ = FileExt::unlock(&file);
        let committed = written?;

        let id = committed.id.clone();
        self.hub.publish(committed);
        Ok(id)
    }

    /// Catch up, stamp, write. Caller holds the file lock.
    fn write_locked(
        &self,
        file: &mut File,
        offset: &mut u64,
        entry: NewEntry,
    ) -> Result<ConversationEntry, LogError> {
        self.tail(offset)?;
        let committed = self.hub.prepare(entry);

        let line = serde_json::to_string(&StoredLine {
            collection: self.collection.clone(),
            entry: committed.clone(),
        })
        .map_err(|e| LogError::Storage(format!("Failed to serialize entry: {e}")))?;

        let len = file
            .metadata()
            .map_err(|e| LogError::Storage(format!("Failed to stat log file: {e}")))?
            .len();
        // Terminate a torn line so it cannot swallow this one.
        let record = if len > *offset {
            format!("\n{line}\n")
        } else {
            format!("{line}\n")
        };

        file.write_all(record.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| LogError::Storage(format!("Failed to write log file: {e}")))?;
        *offset = len + record.len() as u64;

        Ok(committed)
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
        match tokio::task::spawn_blocking(move || shared.refresh()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(added)) => debug!(added, "Picked up external log commits"),
            Ok(Err(e)) => warn!(error = %e, "Log file refresh failed"),
            Err(e) => {
                warn!(error = %e, "Log file watcher stopped");
                break;
            }
        }
    }
}

#[async_trait]
impl ConversationLog for FileLog {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, entry: NewEntry) -> Result<EntryId, LogError> {
        self.blocking(move |shared| shared.append(entry)).await
    }

    async fn snapshot(&self) -> Result<Snapshot, LogError> {
        self.blocking(|shared| shared.refresh()).await?;
        Ok(self.shared.hub.snapshot())
    }

    fn subscribe(&self) -> Result<LogSubscription, LogError> {
        Ok(self.shared.hub.subscribe())
    }
}
