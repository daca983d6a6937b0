//! # Clonechat Core
//!
//! Domain types, traits, and error definitions for the Clonechat
//! retrieval-augmented assistant. This crate has **no transport
//! dependencies**: it defines the model every other crate implements against.
//!
//! ## Collaborator boundaries
//!
//! The response pipeline talks to the outside world through two traits
//! defined here:
//! - [`GenerationClient`] — the generative model endpoint
//! - [`ConversationLog`] — the ordered, append-only, multi-reader log
//!
//! Concrete implementations live in `clonechat-providers` and `clonechat-log`.

pub mod entry;
pub mod error;
pub mod event;
pub mod generation;
pub mod knowledge;
pub mod log;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use entry::{ConversationEntry, EntryId, NewEntry, Sender, Snapshot, ASSISTANT_AUTHOR_ID};
pub use error::{
    CycleError, Error, GenerationError, GenerationFailureKind, LogError, Result, ValidationError,
};
pub use event::{DomainEvent, EventBus};
pub use generation::{GenerationClient, GenerationRequest, Turn, TurnRole};
pub use knowledge::{KnowledgeBase, KnowledgeItem};
pub use log::{ConversationLog, LogSubscription, SubscriptionHandle, subscribe_with};
pub use session::{Session, SessionSource, SessionWatch};
