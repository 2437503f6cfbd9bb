//! Document grading trait and types

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::Grade;
use crate::domain::DomainError;
use crate::domain::retrieval::RetrievedDocument;

/// A retrieved document with its grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedDocument {
    pub document: RetrievedDocument,
    pub grade: Grade,
    /// Grade score (0.0 - 1.0)
    pub grade_score: f32,
    /// Explanation or self-reflection note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GradedDocument {
    pub fn new(document: RetrievedDocument, grade: Grade, grade_score: f32) -> Self {
        Self {
            document,
            grade,
            grade_score: grade_score.clamp(0.0, 1.0),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }

    /// Only relevant and ambiguous documents may reach the context
    pub fn may_reach_context(&self, include_ambiguous: bool) -> bool {
        match self.grade {
            Grade::Relevant => true,
            Grade::Ambiguous => include_ambiguous,
            Grade::Irrelevant => false,
        }
    }
}

/// Trait for grading a document's relevance to a query
#[async_trait]
pub trait DocumentGrader: Send + Sync + Debug {
    async fn grade_document(
        &self,
        query: &str,
        document: &RetrievedDocument,
    ) -> Result<GradedDocument, DomainError>;

    fn grader_name(&self) -> &'static str;
}
