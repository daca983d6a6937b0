//! Generation trait — the abstraction over the generative model endpoint.
//!
//! A generation client knows how to send a list of role-tagged text turns to
//! a model and get generated text back. The response pipeline calls it once
//! per cycle and never retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::GenerationError;

/// Role of a request turn. The pipeline only ever sends user turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
}

/// A single role-tagged text turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// The payload handed to a [`GenerationClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub turns: Vec<Turn>,
}

impl GenerationRequest {
    /// A request made of exactly one user turn.
    pub fn single_user_turn(text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn {
                role: TurnRole::User,
                text: text.into(),
            }],
        }
    }

    /// Text of the first turn, or `""` for an empty request.
    pub fn prompt_text(&self) -> &str {
        self.turns.first().map(|t| t.text.as_str()).unwrap_or("")
    }
}

/// The core GenerationClient trait.
///
/// Implementations: Gemini `generateContent`, a static offline responder,
/// and scripted mocks in tests.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// A human-readable name for this client (e.g., "gemini", "static").
    fn name(&self) -> &str;

    /// Send a request and return the first generated text part.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;

    /// Whether the endpoint is reachable.
    async fn health_check(&self) -> Result<bool, GenerationError> {
        Ok(true)
    }
}
