use super::{LlmError, TextGenerator};

pub const STUB_RESPONSE: &str = "Bot Response";

/// Offline generator that answers every prompt with [`STUB_RESPONSE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StubGenerator;

#[async_trait::async_trait]
impl TextGenerator for StubGenerator {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(STUB_RESPONSE.to_string())
    }
}
