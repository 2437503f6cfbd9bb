//! Threshold-based document grader
//!
//! Grades documents from their retrieval scores using configurable thresholds.

use async_trait::async_trait;

use crate::domain::crag::{CragConfig, DocumentGrader, GradedDocument};
use crate::domain::retrieval::RetrievedDocument;
use crate::domain::DomainError;

/// Grader that uses retrieval score thresholds only
#[derive(Debug, Clone)]
pub struct ThresholdGrader {
    config: CragConfig,
}

impl ThresholdGrader {
    pub fn new(config: CragConfig) -> Self {
        Self { config }
    }

    /// Grade without going through the trait; never fails
    pub fn grade(&self, document: &RetrievedDocument) -> GradedDocument {
        let grade = self.config.classify(document.score);
        GradedDocument::new(document.clone(), grade, document.score)
    }
}

#[async_trait]
impl DocumentGrader for ThresholdGrader {
    async fn grade_document(
        &self,
        _query: &str,
        document: &RetrievedDocument,
    ) -> Result<GradedDocument, DomainError> {
        Ok(self.grade(document))
    }

    fn grader_name(&self) -> &'static str {
        "threshold"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crag::Grade;

    fn doc(id: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument::new(id, id, format!("Content for {}", id), score)
    }

    #[tokio::test]
    async fn test_default_thresholds() {
        let grader = ThresholdGrader::new(CragConfig::default());

        let relevant = grader.grade_document("q", &doc("a", 0.9)).await.unwrap();
        let ambiguous = grader.grade_document("q", &doc("b", 0.5)).await.unwrap();
        let irrelevant = grader.grade_document("q", &doc("c", 0.2)).await.unwrap();

        assert_eq!(relevant.grade, Grade::Relevant);
        assert_eq!(relevant.grade_score, 0.9);
        assert_eq!(ambiguous.grade, Grade::Ambiguous);
        assert_eq!(irrelevant.grade, Grade::Irrelevant);
    }

    #[tokio::test]
    async fn test_custom_thresholds() {
        let grader = ThresholdGrader::new(CragConfig::threshold_based(0.9, 0.7));

        assert_eq!(grader.grade(&doc("a", 0.85)).grade, Grade::Ambiguous);
        assert_eq!(grader.grade(&doc("b", 0.6)).grade, Grade::Irrelevant);
    }
}
