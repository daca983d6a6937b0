//! Prompt composition — turns a query and an optional passage into the
//! single user turn sent to the generation client.

use clonechat_core::generation::GenerationRequest;

/// Persona and scope instructions that open every prompt.
pub const DEFAULT_PREAMBLE: &str = "You are an AI assistant specialized in explaining concepts related to Generative AI, RAG, Prompt Engineering, Vector Databases, and related technologies. Answer the user's question concisely and accurately.";

/// Header placed before a retrieved passage.
pub const PASSAGE_HEADER: &str = "Here is some relevant information:";

/// Used instead of a passage when retrieval found nothing.
pub const NO_PASSAGE_NOTE: &str = "No specific relevant information found in the knowledge base. Try to answer based on general knowledge about AI topics if possible, or state if you don't know.";

/// Compose with the default preamble.
pub fn compose(query: &str, passage: Option<&str>) -> GenerationRequest {
    PromptComposer::default().compose(query, passage)
}

/// Builds prompts around a fixed preamble.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    preamble: String,
}

impl PromptComposer {
    pub fn new() -> Self {
        Self::with_preamble(DEFAULT_PREAMBLE)
    }

    pub fn with_preamble(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn compose(&self, query: &str, passage: Option<&str>) -> GenerationRequest {
        let mut text = self.preamble.clone();
        match passage {
            Some(passage) => {
                text.push_str("\n\n");
                text.push_str(PASSAGE_HEADER);
                text.push('\n');
                text.push_str(passage);
                text.push_str("\n\n");
            }
            None => {
                text.push_str("\n\n");
                text.push_str(NO_PASSAGE_NOTE);
            }
        }
        text.push_str("\n\nUser's question: ");
        text.push_str(query);
        text.push_str("\n\nAnswer:");

        GenerationRequest::single_user_turn(text)
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new()
    }
}
