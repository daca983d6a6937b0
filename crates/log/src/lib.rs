//! Conversation log stores for Clonechat.
//!
//! Every store shares the [`SnapshotHub`] commit/notify machinery, so all of
//! them deliver the same full-snapshot subscription semantics.
//!
//! The file and SQLite stores can be shared by several processes. Each one
//! watches the store for commits it did not make and folds them into its
//! snapshots.

pub mod file_backend;
pub mod hub;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileLog;
pub use hub::SnapshotHub;
pub use in_memory::InMemoryLog;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLog;

use clonechat_config::LogConfig;
use clonechat_core::error::LogError;
use clonechat_core::log::ConversationLog;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How often durable stores look for commits from other processes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Open the store named by `config.backend`.
pub async fn build_from_config(config: &LogConfig) -> Result<Arc<dyn ConversationLog>, LogError> {
    let collection = config.collection_path();
    let poll_interval = config.poll_interval();

    let log: Arc<dyn ConversationLog> = match config.backend.as_str() {
        "memory" => Arc::new(InMemoryLog::new()),
        "file" => Arc::new(FileLog::open_with(
            config.resolved_path(),
            collection.clone(),
            poll_interval,
        )?),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = format!("sqlite://{}", config.resolved_path().display());
            Arc::new(SqliteLog::open_with(&url, collection.clone(), poll_interval).await?)
        }
        other => {
            return Err(LogError::Unavailable(format!(
                "log backend '{other}' is not available in this build"
            )));
        }
    };

    info!(backend = log.name(), collection = %collection, "Conversation log ready");
    Ok(log)
}
