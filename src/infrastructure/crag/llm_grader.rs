//! LLM-based document grader
//!
//! Asks an LLM to rate document relevance on a 0-10 scale.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::crag::{CragConfig, DocumentGrader, GradedDocument};
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::retrieval::RetrievedDocument;
use crate::domain::DomainError;

/// Grader that uses an LLM for evaluation
#[derive(Debug, Clone)]
pub struct LlmGrader {
    provider: Arc<dyn LlmProvider>,
    config: CragConfig,
    model: String,
}

impl LlmGrader {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, config: CragConfig) -> Self {
        Self {
            provider,
            config,
            model: model.into(),
        }
    }

    fn build_evaluation_prompt(&self, query: &str, document: &RetrievedDocument) -> String {
        self.config
            .evaluation_prompt()
            .replace("${query}", query)
            .replace("${document_title}", &document.title)
            .replace("${document_content}", &document.text)
    }

    fn parse_llm_response(&self, response: &str) -> Result<LlmScoreResponse, DomainError> {
        let json_str = extract_json(response).unwrap_or(response);

        serde_json::from_str(json_str).map_err(|e| {
            warn!(error = %e, response = %response, "Failed to parse LLM grading response");
            DomainError::validation(format!("Invalid LLM grading response format: {}", e))
        })
    }
}

/// Response structure from LLM grading
#[derive(Debug, Deserialize)]
struct LlmScoreResponse {
    score: f32,
    reason: Option<String>,
}

/// Extract a JSON object from a string (handles markdown code blocks)
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[async_trait]
impl DocumentGrader for LlmGrader {
    async fn grade_document(
        &self,
        query: &str,
        document: &RetrievedDocument,
    ) -> Result<GradedDocument, DomainError> {
        let request = LlmRequest::builder()
            .user(self.build_evaluation_prompt(query, document))
            .temperature(self.config.temperature)
            .max_tokens(150)
            .build();

        let response = self.provider.chat(&self.model, request).await?;
        let parsed = self.parse_llm_response(response.content())?;

        // LLM returns 0-10
        let score = (parsed.score / 10.0).clamp(0.0, 1.0);
        let grade = self.config.classify(score);

        debug!(
            document_id = %document.id,
            raw = parsed.score,
            score,
            grade = ?grade,
            "Document graded by LLM"
        );

        let mut graded = GradedDocument::new(document.clone(), grade, score);
        if let Some(reason) = parsed.reason {
            graded = graded.with_note(reason);
        }

        Ok(graded)
    }

    fn grader_name(&self) -> &'static str {
        "llm"
    }
}
