//! CRAG result types and verdict reduction

use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::{CragConfig, Grade};
use super::grader::GradedDocument;

/// Pipeline-level outcome of grading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CragVerdict {
    /// Enough relevant evidence to answer
    Proceed,
    /// Evidence is clearly off-topic; answer with a refusal
    Refuse,
    /// Answer with a disclaimer over weak or missing evidence
    Degrade,
}

impl CragVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "PROCEED",
            Self::Refuse => "REFUSE",
            Self::Degrade => "DEGRADE",
        }
    }
}

impl fmt::Display for CragVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Grade counts for one grading round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeTally {
    pub relevant: usize,
    pub ambiguous: usize,
    pub irrelevant: usize,
}

impl GradeTally {
    pub fn from_documents(documents: &[GradedDocument]) -> Self {
        documents.iter().fold(Self::default(), |mut tally, doc| {
            tally.add(doc.grade);
            tally
        })
    }

    pub fn add(&mut self, grade: Grade) {
        match grade {
            Grade::Relevant => self.relevant += 1,
            Grade::Ambiguous => self.ambiguous += 1,
            Grade::Irrelevant => self.irrelevant += 1,
        }
    }

    pub fn graded(&self) -> usize {
        self.relevant + self.ambiguous + self.irrelevant
    }

    /// Share of IRRELEVANT grades among graded documents
    pub fn irrelevant_ratio(&self) -> f32 {
        match self.graded() {
            0 => 0.0,
            graded => self.irrelevant as f32 / graded as f32,
        }
    }
}

/// Reduce a tally to a verdict and its reason.
///
/// Depends only on counts, so the completion order of concurrent grades
/// cannot change the outcome.
pub fn reduce_verdict(tally: &GradeTally, config: &CragConfig) -> (CragVerdict, String) {
    if tally.relevant > 0 {
        return (
            CragVerdict::Proceed,
            format!(
                "{} of {} documents graded relevant",
                tally.relevant,
                tally.graded()
            ),
        );
    }

    if tally.graded() == 0 {
        return (
            CragVerdict::Degrade,
            "No documents were graded".to_string(),
        );
    }

    if tally.irrelevant >= config.refuse_min_irrelevant
        && tally.irrelevant_ratio() >= config.refuse_irrelevant_ratio
    {
        return (
            CragVerdict::Refuse,
            format!(
                "No relevant documents; {} of {} graded irrelevant",
                tally.irrelevant,
                tally.graded()
            ),
        );
    }

    (
        CragVerdict::Degrade,
        format!(
            "No relevant documents; {} ambiguous, {} irrelevant",
            tally.ambiguous, tally.irrelevant
        ),
    )
}

/// Aggregate of one grading stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CragResult {
    /// Graded documents in retrieval order
    pub documents: Vec<GradedDocument>,
    pub verdict: CragVerdict,
    pub reason: String,
    pub tally: GradeTally,
    /// Query the final grading round evaluated against
    pub evaluated_query: String,
    pub watchdog_triggered: bool,
    pub self_reflection_attempted: bool,
}

impl CragResult {
    /// Build a result by reducing the graded documents
    pub fn from_graded(
        documents: Vec<GradedDocument>,
        evaluated_query: impl Into<String>,
        config: &CragConfig,
    ) -> Self {
        let tally = GradeTally::from_documents(&documents);
        let (verdict, reason) = reduce_verdict(&tally, config);

        Self {
            documents,
            verdict,
            reason,
            tally,
            evaluated_query: evaluated_query.into(),
            watchdog_triggered: false,
            self_reflection_attempted: false,
        }
    }

    /// DEGRADE without grading when every retrieval strategy failed
    pub fn retrieval_unavailable(evaluated_query: impl Into<String>) -> Self {
        Self {
            documents: Vec::new(),
            verdict: CragVerdict::Degrade,
            reason: "Retrieval unavailable; no evidence".to_string(),
            tally: GradeTally::default(),
            evaluated_query: evaluated_query.into(),
            watchdog_triggered: false,
            self_reflection_attempted: false,
        }
    }

    pub fn with_watchdog_triggered(mut self, triggered: bool) -> Self {
        self.watchdog_triggered = triggered;
        self
    }

    pub fn with_self_reflection_attempted(mut self, attempted: bool) -> Self {
        self.self_reflection_attempted = attempted;
        self
    }

    /// Documents allowed to reach the context
    pub fn survivors(&self, include_ambiguous: bool) -> Vec<GradedDocument> {
        self.documents
            .iter()
            .filter(|d| d.may_reach_context(include_ambiguous))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::RetrievedDocument;

    fn graded(id: &str, grade: Grade) -> GradedDocument {
        let doc = RetrievedDocument::new(id, id, format!("Content for {}", id), 0.5);
        GradedDocument::new(doc, grade, 0.5)
    }

    fn tally(relevant: usize, ambiguous: usize, irrelevant: usize) -> GradeTally {
        GradeTally {
            relevant,
            ambiguous,
            irrelevant,
        }
    }

    #[test]
    fn test_any_relevant_proceeds() {
        let config = CragConfig::default();
        let (verdict, _) = reduce_verdict(&tally(1, 0, 9), &config);
        assert_eq!(verdict, CragVerdict::Proceed);
    }

    #[test]
    fn test_only_ambiguous_degrades() {
        let config = CragConfig::default();
        let (verdict, _) = reduce_verdict(&tally(0, 3, 0), &config);
        assert_eq!(verdict, CragVerdict::Degrade);
    }

    #[test]
    fn test_mostly_irrelevant_refuses() {
        let config = CragConfig::default();
        let (verdict, reason) = reduce_verdict(&tally(0, 1, 2), &config);

        assert_eq!(verdict, CragVerdict::Refuse);
        assert!(reason.contains("2 of 3"));
    }

    #[test]
    fn test_refuse_policy_thresholds() {
        let config = CragConfig::default().with_refuse_policy(3, 0.5);
        let (verdict, _) = reduce_verdict(&tally(0, 0, 2), &config);
        assert_eq!(verdict, CragVerdict::Degrade);

        let config = CragConfig::default().with_refuse_policy(1, 0.8);
        let (verdict, _) = reduce_verdict(&tally(0, 2, 3), &config);
        assert_eq!(verdict, CragVerdict::Degrade);
    }

    #[test]
    fn test_nothing_graded_degrades() {
        let config = CragConfig::default();
        let (verdict, _) = reduce_verdict(&GradeTally::default(), &config);
        assert_eq!(verdict, CragVerdict::Degrade);
    }

    #[test]
    fn test_reduction_ignores_order() {
        let config = CragConfig::default();
        let mut docs = vec![
            graded("a", Grade::Irrelevant),
            graded("b", Grade::Ambiguous),
            graded("c", Grade::Irrelevant),
            graded("d", Grade::Relevant),
        ];
        let forward = CragResult::from_graded(docs.clone(), "q", &config);
        docs.reverse();
        let backward = CragResult::from_graded(docs, "q", &config);

        assert_eq!(forward.verdict, backward.verdict);
        assert_eq!(forward.tally, backward.tally);
    }

    #[test]
    fn test_survivors() {
        let config = CragConfig::default();
        let result = CragResult::from_graded(
            vec![
                graded("a", Grade::Relevant),
                graded("b", Grade::Ambiguous),
                graded("c", Grade::Irrelevant),
            ],
            "q",
            &config,
        );

        assert_eq!(result.survivors(true).len(), 2);
        assert_eq!(result.survivors(false).len(), 1);
    }

    #[test]
    fn test_retrieval_unavailable() {
        let result = CragResult::retrieval_unavailable("q");

        assert_eq!(result.verdict, CragVerdict::Degrade);
        assert!(result.documents.is_empty());
        assert_eq!(result.tally.graded(), 0);
    }

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_string(&CragVerdict::Proceed).unwrap();
        assert_eq!(json, "\"PROCEED\"");
    }
}
