//! Lexical reranker
//!
//! Blends the grade score with how much of the query the document covers.

use crate::domain::crag::GradedDocument;
use crate::domain::rerank::{compare_ranked, RankedDocument, Reranker};
use crate::infrastructure::text;

const GRADE_WEIGHT: f32 = 0.6;
const OVERLAP_WEIGHT: f32 = 0.4;

#[derive(Debug, Clone, Default)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn new() -> Self {
        Self
    }
}

impl Reranker for LexicalReranker {
    fn rerank(&self, query: &str, documents: Vec<GradedDocument>) -> Vec<RankedDocument> {
        let query_terms = text::term_set(query);

        let mut ranked: Vec<RankedDocument> = documents
            .into_iter()
            .map(|graded| {
                let overlap = text::coverage(
                    &query_terms,
                    &format!("{} {}", graded.document.title, graded.document.text),
                );
                let score = GRADE_WEIGHT * graded.grade_score + OVERLAP_WEIGHT * overlap;
                RankedDocument::new(graded, score)
            })
            .collect();

        ranked.sort_by(compare_ranked);
        ranked
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}
