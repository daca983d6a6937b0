//! The retrieval-augmented response pipeline — the heart of Clonechat.
//!
//! A send cycle follows **Append → Retrieve → Compose → Generate → Append**:
//!
//! 1. **Append** the user's query to the conversation log
//! 2. **Retrieve** the best-matching passage from the knowledge base
//! 3. **Compose** a single-turn prompt around the query and passage
//! 4. **Generate** a reply via the configured generation client
//! 5. **Append** the reply (or a fixed error text) to the log
//!
//! At most one cycle runs at a time per controller.

pub mod compose;
pub mod controller;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compose::{compose, PromptComposer, DEFAULT_PREAMBLE, NO_PASSAGE_NOTE, PASSAGE_HEADER};
pub use controller::{ChatController, CycleOutcome, GenerationStatus};
pub use retrieval::{RetrievalMatch, Retriever};
