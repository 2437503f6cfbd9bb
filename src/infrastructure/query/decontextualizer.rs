//! Rewriting follow-up questions into standalone queries

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::clean_rewrite;
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::pipeline::{ConversationTurn, TurnRole};
use crate::domain::query::Decontextualizer;
use crate::domain::DomainError;

const ANAPHORA: &[&str] = &[
    "it", "its", "that", "this", "those", "these", "they", "them", "their", "there", "he", "she",
    "one", "same", "above",
];

/// Queries this short are treated as follow-ups even without anaphora
const FOLLOW_UP_WORDS: usize = 3;

/// Deterministic rewrite: anaphoric or very short queries get the last user turn appended
#[derive(Debug, Clone, Default)]
pub struct HeuristicDecontextualizer;

impl HeuristicDecontextualizer {
    pub fn new() -> Self {
        Self
    }

    fn needs_context(query: &str) -> bool {
        let words: Vec<String> = query.unicode_words().map(str::to_lowercase).collect();
        words.len() <= FOLLOW_UP_WORDS || words.iter().any(|w| ANAPHORA.contains(&w.as_str()))
    }
}

#[async_trait]
impl Decontextualizer for HeuristicDecontextualizer {
    async fn decontextualize(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<String, DomainError> {
        if !Self::needs_context(query) {
            return Ok(query.to_string());
        }

        let last_user_turn = history
            .iter()
            .rev()
            .find(|turn| turn.role == TurnRole::User)
            .map(|turn| turn.content.trim())
            .filter(|content| !content.is_empty());

        Ok(match last_user_turn {
            Some(previous) => format!("{} (regarding: {})", query.trim(), previous),
            None => query.to_string(),
        })
    }
}

const DECONTEXTUALIZE_INSTRUCTIONS: &str = "Rewrite the user's follow-up question so it can be understood without the conversation. \
Resolve pronouns and references using the conversation. Keep the meaning and language of the question. \
Reply with the rewritten question only.";

/// Rewrite with an LLM over the most recent turns
#[derive(Debug, Clone)]
pub struct LlmDecontextualizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_turns: usize,
}

impl LlmDecontextualizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_turns: 6,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    fn build_request(&self, query: &str, history: &[ConversationTurn]) -> LlmRequest {
        let start = history.len().saturating_sub(self.max_turns);
        let conversation = history[start..]
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n");

        LlmRequest::builder()
            .system(DECONTEXTUALIZE_INSTRUCTIONS)
            .user(format!(
                "Conversation:\n{}\n\nFollow-up question: {}\n\nStandalone question:",
                conversation, query
            ))
            .temperature(0.0)
            .max_tokens(200)
            .build()
    }
}

#[async_trait]
impl Decontextualizer for LlmDecontextualizer {
    async fn decontextualize(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<String, DomainError> {
        let response = self
            .provider
            .chat(&self.model, self.build_request(query, history))
            .await?;

        let rewritten = clean_rewrite(response.content()).ok_or_else(|| {
            DomainError::provider(self.provider.provider_name(), "Empty decontextualized query")
        })?;

        debug!(original = %query, rewritten = %rewritten, "Query decontextualized");
        Ok(rewritten)
    }
}
