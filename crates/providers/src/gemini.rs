//! Google Gemini `generateContent` client.
//!
//! Sends one request per call: the composed prompt as a single user turn.
//! The reply text is read from the first part of the first candidate; any
//! other shape is a malformed response.

use async_trait::async_trait;
use clonechat_core::error::GenerationError;
use clonechat_core::generation::{GenerationClient, GenerationRequest, TurnRole};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Carries the API key so it never appears in a URL or a transport error.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A Gemini REST client bound to one model.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client for `model` at `base_url`.
    ///
    /// `timeout` bounds the whole round trip, body included.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GenerationError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn to_api_request(request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            contents: request
                .turns
                .iter()
                .map(|turn| ApiContent {
                    role: match turn.role {
                        TurnRole::User => "user".into(),
                    },
                    parts: vec![ApiPart {
                        text: Some(turn.text.clone()),
                    }],
                })
                .collect(),
        }
    }

    /// Extract `candidates[0].content.parts[0].text`.
    fn extract_text(body: &str) -> Result<String, GenerationError> {
        let response: ApiResponse = serde_json::from_str(body)
            .map_err(|e| GenerationError::malformed(format!("Failed to parse response: {e}")))?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::malformed("No candidates in response"))?;

        let text = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| GenerationError::malformed("Candidate has no text part"))?;

        if text.is_empty() {
            return Err(GenerationError::malformed("Candidate text is empty"));
        }
        Ok(text)
    }

    async fn round_trip(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header("Content-Type", "application/json")
            .json(&Self::to_api_request(request))
            .send()
            .await
            .map_err(|e| GenerationError::transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::transport(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "Generation endpoint returned error");
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerationError::status(status.as_u16(), message));
        }

        Self::extract_text(&body)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        debug!(model = %self.model, chars = request.prompt_text().len(), "Sending generation request");

        match tokio::time::timeout(self.timeout, self.round_trip(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::transport(format!(
                "Generation request timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .get(&url)
                .header(API_KEY_HEADER, self.api_key.as_str())
                .send(),
        )
        .await
        .map_err(|_| GenerationError::transport("Health check timed out"))?
        .map_err(|e| GenerationError::transport(e.without_url().to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    contents: Vec<ApiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clonechat_core::error::GenerationFailureKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one raw HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}")
    }

    fn client(base_url: &str, timeout_ms: u64) -> GeminiClient {
        GeminiClient::new(base_url, "gemini-2.0-flash", "test-key", Duration::from_millis(timeout_ms))
            .unwrap()
    }

    #[test]
    fn request_body_is_single_user_turn() {
        let request = GenerationRequest::single_user_turn("Explain RAG");
        let body = serde_json::to_value(GeminiClient::to_api_request(&request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Explain RAG" }] }]
            })
        );
    }

    #[test]
    fn endpoint_includes_model() {
        let c = client("https://example.test/v1beta/", 1000);
        assert_eq!(
            c.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"RAG is..."},{"text":"ignored"}]}},{"content":{"parts":[{"text":"second"}]}}]}"#;
        assert_eq!(GeminiClient::extract_text(body).unwrap(), "RAG is...");
    }

    #[test]
    fn missing_candidates_is_malformed() {
        let err = GeminiClient::extract_text(r#"{"promptFeedback":{}}"#).unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::MalformedResponse);
    }

    #[test]
    fn empty_parts_is_malformed() {
        let err =
            GeminiClient::extract_text(r#"{"candidates":[{"content":{"parts":[]}}]}"#).unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::MalformedResponse);
    }

    #[test]
    fn empty_text_is_malformed() {
        let err = GeminiClient::extract_text(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#)
            .unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::MalformedResponse);
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = GeminiClient::extract_text("<html>").unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::MalformedResponse);
    }

    #[tokio::test]
    async fn successful_round_trip() {
        let base = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello from Gemini"}]}}]}"#,
        )
        .await;
        let reply = client(&base, 5000)
            .generate(GenerationRequest::single_user_turn("hi"))
            .await
            .unwrap();
        assert_eq!(reply, "Hello from Gemini");
    }

    #[tokio::test]
    async fn error_status_is_transport_failure() {
        let base = serve_once(
            "403 Forbidden",
            r#"{"error":{"code":403,"message":"API key not valid"}}"#,
        )
        .await;
        let err = client(&base, 5000)
            .generate(GenerationRequest::single_user_turn("hi"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::TransportFailure {
                status: Some(403),
                message: "API key not valid".into()
            }
        );
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without replying.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let err = client(&format!("http://{addr}"), 100)
            .generate(GenerationRequest::single_user_turn("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::TransportFailure);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_failure() {
        // Bind then drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let err = client(&format!("http://{addr}"), 2000)
            .generate(GenerationRequest::single_user_turn("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::TransportFailure);
    }

    #[tokio::test]
    async fn transport_error_does_not_reveal_api_key() {
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let c = GeminiClient::new(
            format!("http://{addr}"),
            "gemini-2.0-flash",
            "SECRET-KEY-123",
            Duration::from_millis(2000),
        )
        .unwrap();

        let err = c.generate(GenerationRequest::single_user_turn("hi")).await.unwrap_err();
        assert_eq!(err.kind(), GenerationFailureKind::TransportFailure);
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");

        let err = c.health_check().await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
    }

    #[tokio::test]
    async fn api_key_travels_in_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let n = socket.read(&mut buf).await.unwrap();
            let body = r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
        });

        client(&format!("http://{addr}"), 5000)
            .generate(GenerationRequest::single_user_turn("hi"))
            .await
            .unwrap();

        let request = rx.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(!request_line.contains("test-key"), "{request_line}");
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
    }
}
