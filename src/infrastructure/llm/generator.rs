//! Generation collaborator: a provider bound to a model and sampling options

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::domain::{DomainError, LlmProvider, LlmRequest, LlmStream, Message};
use crate::infrastructure::observability::{record_llm_request, LlmRequestMetricParams};

/// Model and sampling options for answer generation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerationSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Produces a complete answer or a token stream from prompt messages
#[derive(Debug, Clone)]
pub struct Generator {
    provider: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl Generator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn request(&self, messages: Vec<Message>) -> LlmRequest {
        LlmRequest {
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: false,
        }
    }

    /// Generate the full answer
    pub async fn generate(&self, messages: Vec<Message>) -> Result<String, DomainError> {
        let start = Instant::now();
        let result = self
            .provider
            .chat(&self.settings.model, self.request(messages))
            .await;

        let usage = result.as_ref().ok().and_then(|r| r.usage.clone());
        record_llm_request(LlmRequestMetricParams {
            provider: self.provider.provider_name(),
            model: &self.settings.model,
            duration: start.elapsed(),
            success: result.is_ok(),
            input_tokens: usage.as_ref().map(|u| u64::from(u.prompt_tokens)),
            output_tokens: usage.as_ref().map(|u| u64::from(u.completion_tokens)),
        });

        Ok(result?.content().to_string())
    }

    /// Open a token stream; errors inside the stream surface as stream items
    pub async fn generate_stream(&self, messages: Vec<Message>) -> Result<LlmStream, DomainError> {
        let start = Instant::now();
        let result = self
            .provider
            .chat_stream(&self.settings.model, self.request(messages))
            .await;

        record_llm_request(LlmRequestMetricParams {
            provider: self.provider.provider_name(),
            model: &self.settings.model,
            duration: start.elapsed(),
            success: result.is_ok(),
            input_tokens: None,
            output_tokens: None,
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_generate_returns_content() {
        let provider = MockLlmProvider::new("mock").with_content("Use the reset link [1].");
        let generator = Generator::new(Arc::new(provider.clone()), GenerationSettings::new("m"));

        let answer = generator
            .generate(vec![Message::user("How do I reset?")])
            .await
            .unwrap();

        assert_eq!(answer, "Use the reset link [1].");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_concatenates_to_batch_answer() {
        let provider = MockLlmProvider::new("mock").with_content("one two three");
        let generator = Generator::new(Arc::new(provider), GenerationSettings::new("m"));

        let stream = generator
            .generate_stream(vec![Message::user("count")])
            .await
            .unwrap();
        let text: String = stream
            .filter_map(|chunk| async move { chunk.ok().and_then(|c| c.delta) })
            .collect()
            .await;

        assert_eq!(text, "one two three");
    }

    #[tokio::test]
    async fn test_generate_propagates_provider_error() {
        let provider = MockLlmProvider::new("mock").with_error("unreachable");
        let generator = Generator::new(Arc::new(provider), GenerationSettings::new("m"));

        assert!(generator.generate(vec![Message::user("q")]).await.is_err());
    }
}
