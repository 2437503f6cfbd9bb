//! Pipeline results: citations, evidence level and the final answer

use serde::{Deserialize, Serialize};

use super::metrics::PipelineMetrics;
use super::request::RoutingMode;
use crate::domain::crag::{CragVerdict, Grade};
use crate::domain::query::QueryIntent;

/// Confidence tier of a single citation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// Derive the tier from the retrieval score and the grade.
    ///
    /// Ambiguous documents never rank above MEDIUM.
    pub fn from_scores(retrieval_score: f32, grade_score: f32, grade: Grade) -> Self {
        let combined = (retrieval_score.clamp(0.0, 1.0) + grade_score.clamp(0.0, 1.0)) / 2.0;

        if grade == Grade::Relevant && combined >= 0.75 {
            Self::High
        } else if grade != Grade::Irrelevant && combined >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A reference from the answer to a document that was placed in the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: String,
    pub title: String,
    pub confidence: ConfidenceTier,
}

/// Coarse confidence label of the whole answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceLevel {
    Low,
    Medium,
    High,
}

impl EvidenceLevel {
    /// Derive the evidence level from the grading verdict and the citation tiers
    pub fn derive(verdict: CragVerdict, citations: &[Citation]) -> Self {
        if verdict != CragVerdict::Proceed || citations.is_empty() {
            return Self::Low;
        }

        let total = citations.len() as f32;
        let high = citations
            .iter()
            .filter(|c| c.confidence == ConfidenceTier::High)
            .count() as f32;
        let medium_or_better = citations
            .iter()
            .filter(|c| c.confidence >= ConfidenceTier::Medium)
            .count() as f32;

        if high / total >= 0.5 {
            Self::High
        } else if medium_or_better / total >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Final result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    pub request_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub evidence_level: EvidenceLevel,
    pub verdict: CragVerdict,
    pub routing_mode: RoutingMode,
    pub intent: QueryIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    pub metrics: PipelineMetrics,
}

impl RagResult {
    pub fn is_refusal(&self) -> bool {
        self.verdict == CragVerdict::Refuse
    }

    /// Compare everything except metrics
    pub fn same_content(&self, other: &RagResult) -> bool {
        self.request_id == other.request_id
            && self.answer == other.answer
            && self.citations == other.citations
            && self.evidence_level == other.evidence_level
            && self.verdict == other.verdict
            && self.routing_mode == other.routing_mode
            && self.intent == other.intent
            && self.disclaimer == other.disclaimer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(id: &str, confidence: ConfidenceTier) -> Citation {
        Citation {
            document_id: id.to_string(),
            title: format!("Title {}", id),
            confidence,
        }
    }

    #[test]
    fn test_confidence_tier() {
        assert_eq!(
            ConfidenceTier::from_scores(0.9, 0.8, Grade::Relevant),
            ConfidenceTier::High
        );
        assert_eq!(
            ConfidenceTier::from_scores(0.9, 0.8, Grade::Ambiguous),
            ConfidenceTier::Medium
        );
        assert_eq!(
            ConfidenceTier::from_scores(0.5, 0.6, Grade::Relevant),
            ConfidenceTier::Medium
        );
        assert_eq!(
            ConfidenceTier::from_scores(0.2, 0.4, Grade::Relevant),
            ConfidenceTier::Low
        );
    }

    #[test]
    fn test_evidence_level_from_verdict() {
        let citations = vec![citation("a", ConfidenceTier::High)];

        assert_eq!(
            EvidenceLevel::derive(CragVerdict::Proceed, &citations),
            EvidenceLevel::High
        );
        assert_eq!(
            EvidenceLevel::derive(CragVerdict::Degrade, &citations),
            EvidenceLevel::Low
        );
        assert_eq!(
            EvidenceLevel::derive(CragVerdict::Proceed, &[]),
            EvidenceLevel::Low
        );
    }

    #[test]
    fn test_evidence_level_distribution() {
        let mixed = vec![
            citation("a", ConfidenceTier::High),
            citation("b", ConfidenceTier::Medium),
            citation("c", ConfidenceTier::Low),
        ];
        assert_eq!(
            EvidenceLevel::derive(CragVerdict::Proceed, &mixed),
            EvidenceLevel::Medium
        );

        let weak = vec![
            citation("a", ConfidenceTier::Low),
            citation("b", ConfidenceTier::Low),
            citation("c", ConfidenceTier::Medium),
        ];
        assert_eq!(
            EvidenceLevel::derive(CragVerdict::Proceed, &weak),
            EvidenceLevel::Low
        );
    }
}
