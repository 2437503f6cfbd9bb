//! Generation prompt assembly
//!
//! System message: the contract's rendered instructions plus optional
//! exemplars. User message: the numbered sources and the question.

use std::sync::Arc;

use tracing::warn;

use crate::domain::contract::AnswerContract;
use crate::domain::llm::{LlmRequest, Message};
use crate::domain::prompt::{AnswerExemplar, ExampleProvider};
use crate::domain::query::QueryIntent;
use crate::infrastructure::context::{estimate_tokens, BuiltContext};

const NO_SOURCES_NOTE: &str = "No sources are available for this question. Answer only if you are certain, and say that the knowledge base did not cover it.";

/// A prompt ready for the generator
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub messages: Vec<Message>,
    pub contract: String,
    pub exemplars: usize,
    pub estimated_tokens: usize,
    /// Set when a best-effort enrichment was skipped
    pub degradation: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    examples: Option<Arc<dyn ExampleProvider>>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_examples(mut self, examples: Arc<dyn ExampleProvider>) -> Self {
        self.examples = Some(examples);
        self
    }

    pub async fn build(
        &self,
        contract: &AnswerContract,
        intent: QueryIntent,
        query: &str,
        context: &BuiltContext,
        max_exemplars: usize,
    ) -> BuiltPrompt {
        let mut degradation = None;

        let system = match contract.render_system(intent) {
            Ok(system) => system,
            Err(e) => {
                warn!(contract = %contract.name, error = %e, "Contract template failed to render");
                degradation = Some(format!("Contract template failed: {}", e));
                plain_system(contract)
            }
        };

        let exemplars = match self.fetch_exemplars(intent, query, max_exemplars).await {
            Ok(exemplars) => exemplars,
            Err(reason) => {
                degradation.get_or_insert(reason);
                Vec::new()
            }
        };

        let system = if exemplars.is_empty() {
            system
        } else {
            format!("{}\n\n{}", system, render_exemplars(&exemplars))
        };

        let user = if context.is_empty() {
            format!("{}\n\nQuestion: {}", NO_SOURCES_NOTE, query)
        } else {
            format!("Sources:\n{}\n\nQuestion: {}", context.render(), query)
        };

        let messages = vec![Message::system(system), Message::user(user)];
        let estimated_tokens = estimate_tokens(&LlmRequest::new(messages.clone()).transcript());

        BuiltPrompt {
            messages,
            contract: contract.name.clone(),
            exemplars: exemplars.len(),
            estimated_tokens,
            degradation,
        }
    }

    async fn fetch_exemplars(
        &self,
        intent: QueryIntent,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnswerExemplar>, String> {
        let Some(examples) = &self.examples else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        examples
            .examples(intent, query, limit)
            .await
            .map(|mut found| {
                found.truncate(limit);
                found
            })
            .map_err(|e| {
                warn!(error = %e, "Exemplar lookup failed; building prompt without examples");
                format!("Exemplar lookup failed: {}", e)
            })
    }
}

fn plain_system(contract: &AnswerContract) -> String {
    format!(
        "Answer strictly from the numbered sources. Tone: {}. {} Keep the answer under {} words. If the sources do not contain the answer, reply exactly with: {}",
        contract.tone, contract.format_instructions, contract.max_words, contract.refusal_text
    )
}

fn render_exemplars(exemplars: &[AnswerExemplar]) -> String {
    let body = exemplars
        .iter()
        .map(|e| format!("Question: {}\nAnswer: {}", e.question, e.answer))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Examples of the expected answer style:\n\n{}", body)
}
