//! End-to-end integration tests for the Clonechat response pipeline.
//!
//! These tests exercise the full path from a submitted query to the entries
//! every reader of the shared log observes, across log backends and the
//! HTTP gateway.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use clonechat_agent::{ChatController, GenerationStatus, NO_PASSAGE_NOTE, PASSAGE_HEADER, Retriever};
use clonechat_config::{AppConfig, ChatConfig, GenerationConfig, LogConfig, PromptConfig};
use clonechat_core::entry::{ASSISTANT_AUTHOR_ID, Sender};
use clonechat_core::error::{CycleError, GenerationError, ValidationError};
use clonechat_core::generation::{GenerationClient, GenerationRequest};
use clonechat_core::knowledge::KnowledgeBase;
use clonechat_core::log::ConversationLog;
use clonechat_core::session::SessionSource;
use clonechat_log::{FileLog, InMemoryLog};
use tokio::sync::Notify;

// ── Mock Generators ──────────────────────────────────────────────────────

/// Returns scripted results in sequence and records every request.
struct ScriptedGenerator {
    results: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(results: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn text(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.prompt_text().to_string())
            .unwrap_or_default()
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl GenerationClient for ScriptedGenerator {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedGenerator exhausted"))
    }
}

/// Blocks inside `generate` until released.
struct GatedGenerator {
    entered: Notify,
    gate: Notify,
}

#[async_trait::async_trait]
impl GenerationClient for GatedGenerator {
    fn name(&self) -> &str {
        "e2e_gated"
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<String, GenerationError> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok("released".into())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn controller_with(
    log: Arc<dyn ConversationLog>,
    generator: Arc<dyn GenerationClient>,
    session: &SessionSource,
) -> ChatController {
    ChatController::new(
        log,
        generator,
        Retriever::new(Arc::new(KnowledgeBase::builtin())),
        session.watch(),
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Send cycles
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_rag_question_is_grounded_and_logged() {
    let log = Arc::new(InMemoryLog::new());
    let generator = Arc::new(ScriptedGenerator::text("RAG retrieves, then generates."));
    let session = SessionSource::ready("alice");
    let controller = controller_with(log.clone(), generator.clone(), &session);

    let outcome = controller.submit("What is RAG?").await.unwrap();
    assert_eq!(outcome.generation, GenerationStatus::Generated);
    assert_eq!(
        outcome.retrieved_topic.as_deref(),
        Some("RAG (Retrieval-Augmented Generation)")
    );

    let prompt = generator.last_prompt();
    assert!(prompt.contains(PASSAGE_HEADER));
    assert!(prompt.contains("RAG combines the strengths"));
    assert!(prompt.contains("User's question: What is RAG?"));

    let snapshot = log.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].sender, Sender::User);
    assert_eq!(snapshot[0].text, "What is RAG?");
    assert_eq!(snapshot[0].author_id, "alice");
    assert_eq!(snapshot[1].sender, Sender::Assistant);
    assert_eq!(snapshot[1].text, "RAG retrieves, then generates.");
    assert_eq!(snapshot[1].author_id, ASSISTANT_AUTHOR_ID);
    assert_eq!(snapshot[1].id, outcome.reply_entry_id);
}

#[tokio::test]
async fn e2e_unmatched_question_falls_back_to_general_knowledge() {
    let log = Arc::new(InMemoryLog::new());
    let generator = Arc::new(ScriptedGenerator::text("I can't check the weather."));
    let session = SessionSource::ready("alice");
    let controller = controller_with(log.clone(), generator.clone(), &session);

    let outcome = controller.submit("What's the weather today?").await.unwrap();
    assert!(outcome.retrieved_topic.is_none());

    let prompt = generator.last_prompt();
    assert!(prompt.contains(NO_PASSAGE_NOTE));
    assert!(!prompt.contains("relevant information"));
    assert_eq!(log.snapshot().await.unwrap().len(), 2);
}

#[tokio::test]
async fn e2e_blank_query_is_rejected_without_writes() {
    let log = Arc::new(InMemoryLog::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let session = SessionSource::ready("alice");
    let controller = controller_with(log.clone(), generator.clone(), &session);

    for query in ["", "   ", "\n\t"] {
        let err = controller.submit(query).await.unwrap_err();
        assert_eq!(err, CycleError::Rejected(ValidationError::EmptyQuery));
    }

    assert!(log.snapshot().await.unwrap().is_empty());
    assert_eq!(generator.calls(), 0);
    assert!(!controller.is_sending());
}

#[tokio::test]
async fn e2e_submit_before_sign_in_is_rejected() {
    let log = Arc::new(InMemoryLog::new());
    let session = SessionSource::new();
    let controller = controller_with(log.clone(), Arc::new(ScriptedGenerator::text("hi")), &session);

    let err = controller.submit("What is RAG?").await.unwrap_err();
    assert_eq!(err, CycleError::Rejected(ValidationError::SessionNotReady));

    session.sign_in(None);
    controller.submit("What is RAG?").await.unwrap();
    assert_eq!(log.snapshot().await.unwrap().len(), 2);
}

#[tokio::test]
async fn e2e_transport_failure_writes_one_error_entry() {
    let log = Arc::new(InMemoryLog::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Err(GenerationError::status(503, "overloaded")),
        Ok("Back online.".into()),
    ]));
    let session = SessionSource::ready("alice");
    let controller = controller_with(log.clone(), generator.clone(), &session);

    let outcome = controller.submit("Explain chunking").await.unwrap();
    assert!(matches!(outcome.generation, GenerationStatus::Failed(_)));
    assert!(!controller.is_sending());

    let snapshot = log.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].sender, Sender::Assistant);
    assert_eq!(snapshot[1].text, ChatConfig::default().error_text);

    // The controller is idle again and the next cycle succeeds.
    controller.submit("Explain chunking").await.unwrap();
    let snapshot = log.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot[3].text, "Back online.");
}

#[tokio::test]
async fn e2e_concurrent_submits_produce_one_pair() {
    let log = Arc::new(InMemoryLog::new());
    let generator = Arc::new(GatedGenerator {
        entered: Notify::new(),
        gate: Notify::new(),
    });
    let session = SessionSource::ready("alice");
    let controller = Arc::new(controller_with(log.clone(), generator.clone(), &session));

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit("What is RAG?").await }
    });
    generator.entered.notified().await;
    assert!(controller.is_sending());

    let second = controller.submit("What is RAG?").await;
    assert_eq!(second.unwrap_err(), CycleError::Rejected(ValidationError::CycleInFlight));

    generator.gate.notify_one();
    first.await.unwrap().unwrap();

    let snapshot = log.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].sender, Sender::User);
    assert_eq!(snapshot[1].text, "released");
}

// ═══════════════════════════════════════════════════════════════════════
// Shared log
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_two_clients_share_one_ordered_conversation() {
    let log: Arc<dyn ConversationLog> = Arc::new(InMemoryLog::new());
    let alice = SessionSource::ready("alice");
    let bob = SessionSource::ready("bob");
    let alice_ctl = controller_with(log.clone(), Arc::new(ScriptedGenerator::text("a1")), &alice);
    let bob_ctl = controller_with(log.clone(), Arc::new(ScriptedGenerator::text("b1")), &bob);

    let mut reader = log.subscribe().unwrap();
    assert!(reader.next().await.unwrap().is_empty());

    alice_ctl.submit("Tell me about Llama 3").await.unwrap();
    bob_ctl.submit("What are embeddings?").await.unwrap();

    // Every commit produces a full snapshot; the last one holds all four.
    let mut latest = reader.next().await.unwrap();
    while latest.len() < 4 {
        latest = tokio::time::timeout(Duration::from_secs(1), reader.next())
            .await
            .unwrap()
            .unwrap();
    }

    let authors: Vec<&str> = latest.iter().map(|e| e.author_id.as_str()).collect();
    assert_eq!(authors, vec!["alice", ASSISTANT_AUTHOR_ID, "bob", ASSISTANT_AUTHOR_ID]);
    assert!(latest.windows(2).all(|w| w[0].order_key() <= w[1].order_key()));
}

#[tokio::test]
async fn e2e_file_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat_history.jsonl");
    let collection = LogConfig::default().collection_path();

    {
        let log = Arc::new(FileLog::open(&path, collection.clone()).unwrap());
        let session = SessionSource::ready("alice");
        let controller = controller_with(log, Arc::new(ScriptedGenerator::text("Persisted.")), &session);
        controller.submit("How do vector databases work?").await.unwrap();
    }

    let reopened = FileLog::open(&path, collection).unwrap();
    let snapshot = reopened.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].text, "How do vector databases work?");
    assert_eq!(snapshot[1].text, "Persisted.");
}

// ═══════════════════════════════════════════════════════════════════════
// Config-driven wiring
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_config_builds_working_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let history_path = dir.path().join("history.jsonl");
    std::fs::write(
        &config_path,
        format!(
            r#"
[generation]
provider = "static"
static_reply = "Offline answer."

[log]
backend = "file"
path = "{}"
app_id = "e2e-app"

[prompt]
preamble = "You are a test assistant."
"#,
            history_path.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let config = AppConfig::load_from(&config_path).unwrap();
    assert_eq!(config.log.collection_path(), "artifacts/e2e-app/public/data/chat_history");

    let log = clonechat_log::build_from_config(&config.log).await.unwrap();
    let generator = clonechat_providers::build_from_config(&config.generation).unwrap();
    let session = SessionSource::new();
    session.sign_in(config.session.identity.as_deref());

    let controller = ChatController::new(
        log.clone(),
        generator,
        Retriever::new(Arc::new(config.knowledge_base().unwrap())),
        session.watch(),
    )
    .configured(&config.chat, &config.prompt);

    controller.submit("What is prompt engineering?").await.unwrap();

    let snapshot = log.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].text, "Offline answer.");
    assert!(history_path.exists());
}

#[tokio::test]
async fn e2e_configured_texts_replace_defaults() {
    let log = Arc::new(InMemoryLog::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Err(GenerationError::malformed(
        "no candidates",
    ))]));
    let session = SessionSource::ready("alice");
    let chat = ChatConfig {
        error_text: "down".into(),
        malformed_text: "garbled".into(),
    };
    let prompt = PromptConfig {
        preamble: Some("Custom preamble.".into()),
    };
    let controller = controller_with(log.clone(), generator.clone(), &session).configured(&chat, &prompt);

    controller.submit("What is RAG?").await.unwrap();

    assert!(generator.last_prompt().starts_with("Custom preamble."));
    assert_eq!(log.snapshot().await.unwrap()[1].text, "garbled");
}

#[test]
fn e2e_gemini_provider_without_key_is_a_config_error() {
    let config = GenerationConfig::default();
    assert!(clonechat_providers::build_from_config(&config).is_err());
}

// ═══════════════════════════════════════════════════════════════════════
// Gateway
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_gateway_submit_then_list() {
    let log = Arc::new(InMemoryLog::new());
    let session = SessionSource::ready("web");
    let controller = Arc::new(controller_with(
        log.clone(),
        Arc::new(ScriptedGenerator::text("Streamlit deploys Python apps.")),
        &session,
    ));
    let app = clonechat_gateway::build_router(controller);

    let post = Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"text":"How do I use streamlit?"}"#))
        .unwrap();
    let response = app.clone().oneshot(post).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let outcome: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(outcome["generation"], "generated");

    let get = Request::builder().uri("/v1/messages").body(Body::empty()).unwrap();
    let response = app.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let entries: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["sender"], "user");
    assert_eq!(entries[0]["author_id"], "web");
    assert_eq!(entries[1]["text"], "Streamlit deploys Python apps.");
}

#[tokio::test]
async fn e2e_gateway_rejects_blank_submit() {
    let log = Arc::new(InMemoryLog::new());
    let session = SessionSource::ready("web");
    let controller = Arc::new(controller_with(
        log.clone(),
        Arc::new(ScriptedGenerator::new(vec![])),
        &session,
    ));
    let app = clonechat_gateway::build_router(controller);

    let post = Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"text":"  "}"#))
        .unwrap();
    let response = app.oneshot(post).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(log.snapshot().await.unwrap().is_empty());
}
