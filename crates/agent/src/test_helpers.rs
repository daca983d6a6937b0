//! Shared test collaborators for controller tests.

use async_trait::async_trait;
use clonechat_core::entry::{EntryId, NewEntry, Snapshot};
use clonechat_core::error::{GenerationError, LogError};
use clonechat_core::generation::{GenerationClient, GenerationRequest};
use clonechat_core::log::{ConversationLog, LogSubscription};
use clonechat_log::InMemoryLog;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// A generation client that returns a sequence of scripted results.
///
/// Each call to `generate` pops the next result and records the request.
/// Once the script is exhausted every call is a transport failure.
pub struct ScriptedGenerator {
    results: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(results: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Only successful replies, in order.
    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::transport("script exhausted")))
    }
}

/// A generation client that blocks until [`release`](Self::release) is called.
pub struct GatedGenerator {
    reply: String,
    called: Notify,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            called: Notify::new(),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Resolves once `generate` has been entered.
    pub async fn wait_until_called(&self) {
        self.called.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for GatedGenerator {
    fn name(&self) -> &str {
        "gated_mock"
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // notify_one stores a permit, so a waiter that arrives later still wakes.
        self.called.notify_one();
        self.gate.notified().await;
        Ok(self.reply.clone())
    }
}

/// An in-memory log whose appends start failing after `ok_appends` successes.
pub struct FailingLog {
    inner: InMemoryLog,
    ok_appends: usize,
    appends: AtomicUsize,
}

impl FailingLog {
    pub fn failing_from(ok_appends: usize) -> Self {
        Self {
            inner: InMemoryLog::new(),
            ok_appends,
            appends: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ConversationLog for FailingLog {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn append(&self, entry: NewEntry) -> Result<EntryId, LogError> {
        if self.appends.fetch_add(1, Ordering::SeqCst) >= self.ok_appends {
            return Err(LogError::Unavailable("store offline".into()));
        }
        self.inner.append(entry).await
    }

    async fn snapshot(&self) -> Result<Snapshot, LogError> {
        self.inner.snapshot().await
    }

    fn subscribe(&self) -> Result<LogSubscription, LogError> {
        self.inner.subscribe()
    }
}
