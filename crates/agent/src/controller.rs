//! The conversation controller — one send cycle at a time.
//!
//! States: `Idle → Sending → Idle`. A cycle is
//!
//! 1. **Append** the user entry (failure aborts the cycle)
//! 2. **Retrieve** a passage for the query
//! 3. **Compose** the prompt
//! 4. **Generate**, then append the reply, or a fixed error text on failure
//!
//! Each append is an independent write; a user entry followed by a failed
//! reply append is a valid, observable state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use clonechat_config::{ChatConfig, PromptConfig};
use clonechat_core::entry::{EntryId, NewEntry, Sender};
use clonechat_core::error::{CycleError, GenerationError, GenerationFailureKind, ValidationError};
use clonechat_core::event::{DomainEvent, EventBus};
use clonechat_core::generation::GenerationClient;
use clonechat_core::log::ConversationLog;
use clonechat_core::session::SessionWatch;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compose::PromptComposer;
use crate::retrieval::Retriever;

/// How the generation step of a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Generated,
    Failed(GenerationFailureKind),
}

/// The result of a cycle that reached its final append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleOutcome {
    pub user_entry_id: EntryId,
    /// The assistant entry: the generated reply or the error text
    pub reply_entry_id: EntryId,
    pub retrieved_topic: Option<String>,
    pub generation: GenerationStatus,
}

/// Releases the in-flight flag on every exit path, cancellation included.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates send cycles against a log and a generation client.
pub struct ChatController {
    log: Arc<dyn ConversationLog>,
    generator: Arc<dyn GenerationClient>,
    retriever: Retriever,
    composer: PromptComposer,
    session: SessionWatch,
    event_bus: Arc<EventBus>,
    error_text: String,
    malformed_text: String,
    in_flight: AtomicBool,
}

impl ChatController {
    pub fn new(
        log: Arc<dyn ConversationLog>,
        generator: Arc<dyn GenerationClient>,
        retriever: Retriever,
        session: SessionWatch,
    ) -> Self {
        let chat = ChatConfig::default();
        Self {
            log,
            generator,
            retriever,
            composer: PromptComposer::default(),
            session,
            event_bus: Arc::new(EventBus::default()),
            error_text: chat.error_text,
            malformed_text: chat.malformed_text,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Texts written in place of a reply when generation fails.
    pub fn with_error_texts(
        mut self,
        transport: impl Into<String>,
        malformed: impl Into<String>,
    ) -> Self {
        self.error_text = transport.into();
        self.malformed_text = malformed.into();
        self
    }

    /// Apply the `[chat]` and `[prompt]` configuration sections.
    pub fn configured(self, chat: &ChatConfig, prompt: &PromptConfig) -> Self {
        let composer = match &prompt.preamble {
            Some(preamble) => PromptComposer::with_preamble(preamble),
            None => PromptComposer::default(),
        };
        self.with_composer(composer)
            .with_error_texts(&chat.error_text, &chat.malformed_text)
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn log(&self) -> &Arc<dyn ConversationLog> {
        &self.log
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn session(&self) -> &SessionWatch {
        &self.session
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// The entry text written for a failed generation.
    pub fn fallback_text(&self, kind: GenerationFailureKind) -> &str {
        match kind {
            GenerationFailureKind::TransportFailure => &self.error_text,
            GenerationFailureKind::MalformedResponse => &self.malformed_text,
        }
    }

    /// Run one send cycle for `query`.
    ///
    /// Rejections (`EmptyQuery`, `SessionNotReady`, `CycleInFlight`) have no
    /// side effect. The query is appended exactly as given.
    pub async fn submit(&self, query: &str) -> Result<CycleOutcome, CycleError> {
        if query.trim().is_empty() {
            return Err(self.reject(ValidationError::EmptyQuery));
        }

        let session = self.session.current();
        if !session.is_usable() {
            return Err(self.reject(ValidationError::SessionNotReady));
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            return Err(self.reject(ValidationError::CycleInFlight));
        };

        let started = Instant::now();
        self.event_bus.publish(DomainEvent::CycleStarted {
            session_id: session.id.clone(),
            query_preview: query.chars().take(80).collect(),
            timestamp: Utc::now(),
        });
        info!(session = %session.id, "Send cycle started");

        let result = self.run_cycle(query, &session.id).await;

        let success = matches!(
            &result,
            Ok(CycleOutcome {
                generation: GenerationStatus::Generated,
                ..
            })
        );
        let duration_ms = started.elapsed().as_millis() as u64;
        self.event_bus.publish(DomainEvent::CycleCompleted {
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
        info!(success, duration_ms, "Send cycle finished");

        result
    }

    async fn run_cycle(&self, query: &str, session_id: &str) -> Result<CycleOutcome, CycleError> {
        // ── Step 1: user entry ──
        let user_entry_id = self.append(NewEntry::user(query, session_id)).await?;

        // ── Step 2: retrieval ──
        let retrieved = self.retriever.retrieve_match(query);
        self.event_bus.publish(DomainEvent::PassageRetrieved {
            topic: retrieved.as_ref().map(|m| m.topic.clone()),
            score: retrieved.as_ref().map_or(0, |m| m.score),
            timestamp: Utc::now(),
        });

        // ── Step 3: composition ──
        let request = self
            .composer
            .compose(query, retrieved.as_ref().map(|m| m.content.as_str()));

        // ── Step 4: generation ──
        debug!(client = self.generator.name(), "Requesting generation");
        let (reply, generation) = match self.generator.generate(request).await {
            Ok(text) => (text, GenerationStatus::Generated),
            Err(e) => {
                let kind = e.kind();
                self.report_generation_failure(&e);
                (
                    self.fallback_text(kind).to_string(),
                    GenerationStatus::Failed(kind),
                )
            }
        };

        let reply_entry_id = self.append(NewEntry::assistant(reply)).await?;

        Ok(CycleOutcome {
            user_entry_id,
            reply_entry_id,
            retrieved_topic: retrieved.map(|m| m.topic),
            generation,
        })
    }

    async fn append(&self, entry: NewEntry) -> Result<EntryId, CycleError> {
        let sender: Sender = entry.sender;
        match self.log.append(entry).await {
            Ok(id) => {
                self.event_bus.publish(DomainEvent::EntryAppended {
                    entry_id: id.to_string(),
                    sender,
                    timestamp: Utc::now(),
                });
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, sender = sender.as_str(), "Log append failed");
                Err(CycleError::Log(e))
            }
        }
    }

    fn report_generation_failure(&self, error: &GenerationError) {
        warn!(error = %error, "Generation failed, writing fallback entry");
        self.event_bus.publish(DomainEvent::GenerationFailed {
            kind: error.kind(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn reject(&self, reason: ValidationError) -> CycleError {
        debug!(%reason, "Submit rejected");
        self.event_bus.publish(DomainEvent::SubmitRejected {
            reason,
            timestamp: Utc::now(),
        });
        CycleError::Rejected(reason)
    }
}
