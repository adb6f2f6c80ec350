//! Language model gateway.
//!
//! The gateway turns article text into one of three fixed [`Analysis`]
//! prompts, or passes a chat message through as-is, and sends it to a
//! single-shot [`TextGenerator`]. Every call is independent: there is no
//! conversation context and no streaming.
//!
//! Errors stay typed as [`LlmError`] until the UI boundary, where
//! [`LlmError::user_message`] turns them into the apology shown to the user.

mod gemini;
mod stub;

pub use gemini::{GeminiGenerator, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use stub::{StubGenerator, STUB_RESPONSE};

use crate::config::{LlmConfig, LlmProvider};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const UNAVAILABLE_MESSAGE: &str = "I'm sorry, the Gemini model is not available.";
pub const CALL_FAILED_MESSAGE: &str = "I'm sorry, I encountered an error processing your request.";

#[derive(Debug, Error)]
pub enum LlmError {
    /// No model could be initialised (e.g. missing API key).
    #[error("Language model unavailable: {0}")]
    Unavailable(String),
    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Model request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Model API error {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Model response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
    #[error("Model returned no text")]
    EmptyResponse,
}

impl LlmError {
    /// Text shown in place of a model reply when the call did not succeed.
    pub fn user_message(&self) -> &'static str {
        match self {
            LlmError::Unavailable(_) => UNAVAILABLE_MESSAGE,
            _ => CALL_FAILED_MESSAGE,
        }
    }
}

/// A backend that answers one prompt with one block of text.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Fixed analyses offered in the article reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    Summary,
    Sentiment,
    Keywords,
}

impl Analysis {
    pub const ALL: [Analysis; 3] = [Analysis::Summary, Analysis::Sentiment, Analysis::Keywords];

    /// Builds the prompt for `text`. The wording is part of the contract with
    /// the model and must not drift.
    pub fn prompt(self, text: &str) -> String {
        match self {
            Analysis::Summary => format!(
                "Please provide a concise summary of the following article:\n\n{text}\n\nSummary:"
            ),
            Analysis::Sentiment => format!(
                "Analyze the sentiment of the following article and provide a brief explanation:\n\n{text}"
            ),
            Analysis::Keywords => format!(
                "Extract the 5 most important keywords from the following article:\n\n{text}\n\nKeywords:"
            ),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Analysis::Summary => "Summary",
            Analysis::Sentiment => "Sentiment Analysis",
            Analysis::Keywords => "Keywords",
        }
    }
}

/// Cheap to clone; background tasks each take their own handle.
#[derive(Clone)]
pub struct LlmGateway {
    generator: Result<Arc<dyn TextGenerator>, String>,
}

impl std::fmt::Debug for LlmGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.generator {
            Ok(generator) => f
                .debug_struct("LlmGateway")
                .field("generator", &generator.name())
                .finish(),
            Err(reason) => f
                .debug_struct("LlmGateway")
                .field("unavailable", reason)
                .finish(),
        }
    }
}

impl LlmGateway {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Ok(generator),
        }
    }

    /// A gateway whose every call fails with [`LlmError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            generator: Err(reason.into()),
        }
    }

    /// Builds the configured provider.
    ///
    /// A Gemini provider without an API key is not fatal: the error is logged
    /// and the gateway answers every request with the unavailable message.
    pub fn from_config(config: &LlmConfig, client: reqwest::Client) -> Self {
        match config.provider {
            LlmProvider::Stub => {
                tracing::info!("Using stub language model");
                Self::new(Arc::new(StubGenerator))
            }
            LlmProvider::Gemini => match config.resolved_api_key() {
                Some(key) => {
                    tracing::info!(model = %config.model, "Gemini model initialised");
                    Self::new(Arc::new(GeminiGenerator::new(
                        client,
                        &config.api_base,
                        &config.model,
                        key,
                        Duration::from_secs(config.timeout_secs),
                    )))
                }
                None => {
                    tracing::error!(
                        "Error initializing Gemini model: no API key (set GEMINI_API_KEY or llm.api_key)"
                    );
                    Self::unavailable("no Gemini API key configured")
                }
            },
        }
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_ok()
    }

    /// Runs one of the fixed analyses over an article's text.
    pub async fn analyze(&self, analysis: Analysis, text: &str) -> Result<String, LlmError> {
        self.generate(&analysis.prompt(text)).await
    }

    /// Sends a chat message verbatim. Earlier messages are not included.
    pub async fn chat(&self, message: &str) -> Result<String, LlmError> {
        self.generate(message).await
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let generator = self
            .generator
            .as_ref()
            .map_err(|reason| LlmError::Unavailable(reason.clone()))?;

        let result = generator.generate(prompt).await;
        match &result {
            Ok(reply) => tracing::debug!(
                generator = generator.name(),
                prompt_len = prompt.len(),
                reply_len = reply.len(),
                "Model replied"
            ),
            Err(e) => tracing::error!(
                generator = generator.name(),
                error = %e,
                "Error generating model response"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records every prompt it is given and echoes it back.
    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl TextGenerator for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("echo: {prompt}"))
        }
    }

    struct FailingGenerator;

    #[async_trait::async_trait]
    impl TextGenerator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }
    }

    #[test]
    fn test_prompt_templates_are_exact() {
        assert_eq!(
            Analysis::Summary.prompt("Body"),
            "Please provide a concise summary of the following article:\n\nBody\n\nSummary:"
        );
        assert_eq!(
            Analysis::Sentiment.prompt("Body"),
            "Analyze the sentiment of the following article and provide a brief explanation:\n\nBody"
        );
        assert_eq!(
            Analysis::Keywords.prompt("Body"),
            "Extract the 5 most important keywords from the following article:\n\nBody\n\nKeywords:"
        );
    }

    #[tokio::test]
    async fn test_analyze_sends_template_and_chat_sends_literal() {
        let recorder = Arc::new(RecordingGenerator::default());
        let gateway = LlmGateway::new(recorder.clone());

        gateway.analyze(Analysis::Keywords, "Rust").await.unwrap();
        let reply = gateway.chat("hello there").await.unwrap();
        assert_eq!(reply, "echo: hello there");

        let prompts = recorder.prompts.lock().unwrap().clone();
        assert_eq!(
            prompts,
            vec![
                Analysis::Keywords.prompt("Rust"),
                "hello there".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_unavailable_gateway_message() {
        let gateway = LlmGateway::unavailable("no key");
        assert!(!gateway.is_available());

        let err = gateway.chat("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
        assert_eq!(
            err.user_message(),
            "I'm sorry, the Gemini model is not available."
        );
    }

    #[tokio::test]
    async fn test_call_failure_message() {
        let gateway = LlmGateway::new(Arc::new(FailingGenerator));
        let err = gateway
            .analyze(Analysis::Summary, "text")
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "I'm sorry, I encountered an error processing your request."
        );
    }

    #[tokio::test]
    async fn test_stub_provider_from_config() {
        let config = LlmConfig {
            provider: LlmProvider::Stub,
            ..LlmConfig::default()
        };
        let gateway = LlmGateway::from_config(&config, reqwest::Client::new());
        assert!(gateway.is_available());
        assert_eq!(gateway.chat("anything").await.unwrap(), "Bot Response");
    }
}
