//! Offline generation client that always answers with a fixed text.
//!
//! Selected with `generation.provider = "static"`; handy for demos and for
//! exercising the pipeline without network access.

use async_trait::async_trait;
use clonechat_core::error::GenerationError;
use clonechat_core::generation::{GenerationClient, GenerationRequest};
use tracing::debug;

pub struct StaticClient {
    reply: String,
}

impl StaticClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl GenerationClient for StaticClient {
    fn name(&self) -> &str {
        "static"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        debug!(chars = request.prompt_text().len(), "Static client answering");
        if self.reply.is_empty() {
            return Err(GenerationError::malformed("static reply is empty"));
        }
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clonechat_core::error::GenerationFailureKind;

    #[tokio::test]
    async fn returns_configured_reply() {
        let client = StaticClient::new("offline answer");
        let reply = client
            .generate(GenerationRequest::single_user_turn("anything"))
            .await
            .unwrap();
        assert_eq!(reply, "offline answer");
        assert!(client.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn empty_reply_is_malformed() {
        let client = StaticClient::new("");
        let err = client
            .generate(GenerationRequest::single_user_turn("anything"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::MalformedResponse);
    }
}
