//! Reranking domain

use std::cmp::Ordering;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::domain::crag::GradedDocument;

/// A graded document with its secondary relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub graded: GradedDocument,
    pub rerank_score: f32,
}

impl RankedDocument {
    pub fn new(graded: GradedDocument, rerank_score: f32) -> Self {
        Self {
            graded,
            rerank_score,
        }
    }

    pub fn id(&self) -> &str {
        self.graded.id()
    }

    pub fn retrieval_score(&self) -> f32 {
        self.graded.document.score
    }
}

/// Reorders graded documents that survived grading
pub trait Reranker: Send + Sync + Debug {
    fn rerank(&self, query: &str, documents: Vec<GradedDocument>) -> Vec<RankedDocument>;

    fn name(&self) -> &'static str;
}

/// Total order: rerank score desc, retrieval score desc, id asc
pub fn compare_ranked(a: &RankedDocument, b: &RankedDocument) -> Ordering {
    b.rerank_score
        .total_cmp(&a.rerank_score)
        .then_with(|| b.retrieval_score().total_cmp(&a.retrieval_score()))
        .then_with(|| a.id().cmp(b.id()))
}
