//! Domain event system — decoupled observation of the response pipeline.
//!
//! The controller publishes an event at each step of a send cycle.
//! Loggers, the gateway and tests subscribe without coupling to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::entry::Sender;
use crate::error::{GenerationFailureKind, ValidationError};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A submit passed the guard and a cycle began
    CycleStarted {
        session_id: String,
        query_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A submit was refused before any side effect
    SubmitRejected {
        reason: ValidationError,
        timestamp: DateTime<Utc>,
    },

    /// The log accepted an entry written by the controller
    EntryAppended {
        entry_id: String,
        sender: Sender,
        timestamp: DateTime<Utc>,
    },

    /// Retrieval finished (topic is `None` when nothing matched)
    PassageRetrieved {
        topic: Option<String>,
        score: usize,
        timestamp: DateTime<Utc>,
    },

    /// The generation call failed and an error entry will be written
    GenerationFailed {
        kind: GenerationFailureKind,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The controller is back in Idle
    CycleCompleted {
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
