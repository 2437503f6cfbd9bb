//! Hybrid grader: thresholds first, LLM only for borderline documents

use async_trait::async_trait;
use tracing::debug;

use super::{LlmGrader, ThresholdGrader};
use crate::domain::crag::{DocumentGrader, Grade, GradedDocument};
use crate::domain::retrieval::RetrievedDocument;
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct HybridGrader {
    threshold: ThresholdGrader,
    llm: LlmGrader,
}

impl HybridGrader {
    pub fn new(threshold: ThresholdGrader, llm: LlmGrader) -> Self {
        Self { threshold, llm }
    }
}

#[async_trait]
impl DocumentGrader for HybridGrader {
    async fn grade_document(
        &self,
        query: &str,
        document: &RetrievedDocument,
    ) -> Result<GradedDocument, DomainError> {
        let graded = self.threshold.grade(document);
        if graded.grade != Grade::Ambiguous {
            return Ok(graded);
        }

        debug!(document_id = %document.id, "Ambiguous by threshold, asking LLM");
        self.llm.grade_document(query, document).await
    }

    fn grader_name(&self) -> &'static str {
        "hybrid"
    }
}
