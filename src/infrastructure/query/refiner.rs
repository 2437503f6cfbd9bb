//! Query refinement for self-reflection

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::clean_rewrite;
use crate::domain::crag::{Grade, GradedDocument};
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::query::QueryRefiner;
use crate::domain::DomainError;
use crate::infrastructure::text;

/// Keyword refinement: content words of the query plus title terms of ambiguous hits
#[derive(Debug, Clone)]
pub struct KeywordQueryRefiner {
    max_expansion_terms: usize,
}

impl KeywordQueryRefiner {
    pub fn new() -> Self {
        Self {
            max_expansion_terms: 3,
        }
    }

    pub fn with_max_expansion_terms(mut self, max: usize) -> Self {
        self.max_expansion_terms = max;
        self
    }
}

impl Default for KeywordQueryRefiner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryRefiner for KeywordQueryRefiner {
    async fn refine(&self, query: &str, graded: &[GradedDocument]) -> Result<String, DomainError> {
        let mut refined: Vec<String> = Vec::new();
        for term in text::terms(query) {
            if !refined.contains(&term) {
                refined.push(term);
            }
        }

        if refined.is_empty() {
            return Err(DomainError::validation("Query has no content terms to refine"));
        }

        let mut ambiguous: Vec<&GradedDocument> =
            graded.iter().filter(|d| d.grade == Grade::Ambiguous).collect();
        ambiguous.sort_by(|a, b| {
            b.grade_score
                .total_cmp(&a.grade_score)
                .then_with(|| a.id().cmp(b.id()))
        });

        let mut added = 0;
        for doc in ambiguous {
            for term in text::terms(&doc.document.title) {
                if added >= self.max_expansion_terms {
                    break;
                }
                if !refined.contains(&term) {
                    refined.push(term);
                    added += 1;
                }
            }
        }

        Ok(refined.join(" "))
    }
}

const REFINE_INSTRUCTIONS: &str = "A search for the user's question returned documents that were judged off-topic. \
Write a better search query for the same question: use specific keywords and likely synonyms, drop filler words. \
Reply with the search query only.";

/// Refinement with an LLM
#[derive(Debug, Clone)]
pub struct LlmQueryRefiner {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmQueryRefiner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl QueryRefiner for LlmQueryRefiner {
    async fn refine(&self, query: &str, graded: &[GradedDocument]) -> Result<String, DomainError> {
        let rejected = graded
            .iter()
            .map(|d| format!("- {} ({:?})", d.document.title, d.grade))
            .collect::<Vec<_>>()
            .join("\n");

        let request = LlmRequest::builder()
            .system(REFINE_INSTRUCTIONS)
            .user(format!(
                "Question: {}\n\nDocuments returned:\n{}\n\nSearch query:",
                query, rejected
            ))
            .temperature(0.0)
            .max_tokens(100)
            .build();

        let response = self.provider.chat(&self.model, request).await?;
        let refined = clean_rewrite(response.content()).ok_or_else(|| {
            DomainError::provider(self.provider.provider_name(), "Empty refined query")
        })?;

        debug!(original = %query, refined = %refined, "Query refined");
        Ok(refined)
    }
}
