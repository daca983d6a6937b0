//! Conversation entry domain types.
//!
//! These are the value objects that flow through the log:
//! Controller builds a [`NewEntry`] → the log store assigns id, timestamp and
//! sequence → every subscriber receives the committed [`ConversationEntry`]
//! inside a full [`Snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Author id recorded on every generated (assistant) entry.
pub const ASSISTANT_AUTHOR_ID: &str = "AI";

/// Opaque identifier assigned by the log on append.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            other => Err(format!("unknown sender '{other}'")),
        }
    }
}

/// The append input: everything except what the log assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub text: String,
    pub sender: Sender,
    pub author_id: String,
}

impl NewEntry {
    /// An entry typed by the session user.
    pub fn user(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            author_id: session_id.into(),
        }
    }

    /// A generated (or synthesized error) entry.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Assistant,
            author_id: ASSISTANT_AUTHOR_ID.to_string(),
        }
    }
}

/// A committed, immutable log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Assigned by the log on append
    pub id: EntryId,

    pub text: String,

    pub sender: Sender,

    /// Session identity, or [`ASSISTANT_AUTHOR_ID`] for generated entries
    pub author_id: String,

    /// Store-assigned, monotonically non-decreasing
    pub timestamp: DateTime<Utc>,

    /// Append order; breaks timestamp ties
    pub seq: u64,
}

impl ConversationEntry {
    /// Total-order key of the log: timestamp ascending, then append order.
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.seq)
    }
}

/// The complete ordered conversation at one point in time.
pub type Snapshot = Arc<[ConversationEntry]>;
