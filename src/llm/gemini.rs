use super::{LlmError, TextGenerator};
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "models/gemini-1.5-flash-latest";

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB
const MAX_ERROR_BODY_SIZE: usize = 16 * 1024;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Google Gemini `generateContent` client.
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGenerator")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiGenerator {
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        model: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Self {
        let endpoint = format!(
            "{}/{}:generateContent",
            api_base.trim_end_matches('/'),
            model.trim_start_matches('/')
        );
        Self {
            client,
            endpoint,
            api_key,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, body: Vec<u8>) -> Result<Vec<u8>, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_limited_bytes(response, MAX_ERROR_BODY_SIZE)
                .await
                .map(|raw| String::from_utf8_lossy(&raw).into_owned())
                .unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        read_limited_bytes(response, MAX_RESPONSE_SIZE).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, LlmError> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(LlmError::ResponseTooLarge(limit));
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(LlmError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Concatenates the text parts of the first candidate.
fn reply_text(raw: &[u8]) -> Result<String, LlmError> {
    let parsed: GenerateResponse =
        serde_json::from_slice(raw).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait::async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: prompt }],
            }],
        };
        let body =
            serde_json::to_vec(&request).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let raw = tokio::time::timeout(self.timeout, self.send(body))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))??;

        reply_text(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer, timeout: Duration) -> GeminiGenerator {
        GeminiGenerator::new(
            reqwest::Client::new(),
            &format!("{}/v1beta/", server.uri()),
            "models/gemini-test",
            SecretString::from("test-key".to_string()),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_json(json!({"contents": [{"parts": [{"text": "Say hi"}]}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Hi"}, {"text": " there"}], "role": "model"},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gemini = generator(&server, Duration::from_secs(5));
        assert_eq!(gemini.generate("Say hi").await.unwrap(), "Hi there");
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let gemini = generator(&server, Duration::from_secs(5));
        match gemini.generate("x").await {
            Err(LlmError::HttpStatus { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "API key not valid");
            }
            other => panic!("Expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let gemini = generator(&server, Duration::from_secs(5));
        assert!(matches!(
            gemini.generate("x").await,
            Err(LlmError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"candidates": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let gemini = generator(&server, Duration::from_millis(50));
        let err = gemini.generate("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
        assert_eq!(err.to_string(), "Model request timed out after 50ms");
    }

    #[tokio::test]
    async fn test_oversized_reply_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("x".repeat(MAX_RESPONSE_SIZE + 1)),
            )
            .mount(&server)
            .await;

        let gemini = generator(&server, Duration::from_secs(5));
        assert!(matches!(
            gemini.generate("x").await,
            Err(LlmError::ResponseTooLarge(MAX_RESPONSE_SIZE))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            reply_text(b"not json"),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let gemini = GeminiGenerator::new(
            reqwest::Client::new(),
            DEFAULT_API_BASE,
            DEFAULT_MODEL,
            SecretString::from("k".to_string()),
            Duration::from_secs(1),
        );
        assert_eq!(
            gemini.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }
}
