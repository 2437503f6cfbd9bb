//! CRAG configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Grade assigned to a retrieved document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    /// Document directly supports an answer
    Relevant,
    /// Document relevance is uncertain
    Ambiguous,
    /// Document does not help answer the query
    Irrelevant,
}

impl Grade {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Self::Relevant)
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous)
    }

    pub fn is_irrelevant(&self) -> bool {
        matches!(self, Self::Irrelevant)
    }
}

/// Grading strategy for document evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GradingStrategy {
    /// Use an LLM to evaluate relevance with a prompt
    Llm,
    /// Use retrieval score thresholds only (no LLM call)
    #[default]
    Threshold,
    /// Threshold first, LLM only for ambiguous documents
    Hybrid,
}

/// Configuration for CRAG grading and the corrective policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CragConfig {
    #[serde(default)]
    pub strategy: GradingStrategy,
    /// Minimum score for a RELEVANT grade (0.0 - 1.0)
    #[serde(default = "default_relevant_threshold")]
    pub relevant_threshold: f32,
    /// Minimum score for an AMBIGUOUS grade; below this a document is IRRELEVANT
    #[serde(default = "default_ambiguous_threshold")]
    pub ambiguous_threshold: f32,
    /// Maximum number of documents graded per round
    #[serde(default = "default_max_documents")]
    pub max_documents_to_grade: usize,
    /// Whether AMBIGUOUS documents may reach the context
    #[serde(default = "default_true")]
    pub include_ambiguous: bool,
    /// Worker-pool limit for concurrent grading
    #[serde(default = "default_concurrency")]
    pub grading_concurrency: usize,
    /// Watchdog bounding the whole grading stage, self-reflection included
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,
    /// REFUSE needs at least this many IRRELEVANT grades
    #[serde(default = "default_refuse_min_irrelevant")]
    pub refuse_min_irrelevant: usize,
    /// REFUSE needs at least this share of IRRELEVANT grades among graded documents
    #[serde(default = "default_refuse_irrelevant_ratio")]
    pub refuse_irrelevant_ratio: f32,
    /// Self-reflection retries per request (at most one)
    #[serde(default = "default_self_reflection_budget")]
    pub self_reflection_budget: u8,
    /// Custom evaluation prompt template
    /// Available variables: ${query}, ${document_title}, ${document_content}
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_prompt: Option<String>,
    /// Temperature for LLM grading
    #[serde(default)]
    pub temperature: f32,
}

fn default_relevant_threshold() -> f32 {
    0.7
}

fn default_ambiguous_threshold() -> f32 {
    0.4
}

fn default_max_documents() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_watchdog_timeout_ms() -> u64 {
    8000
}

fn default_refuse_min_irrelevant() -> usize {
    1
}

fn default_refuse_irrelevant_ratio() -> f32 {
    0.5
}

fn default_self_reflection_budget() -> u8 {
    1
}

impl Default for CragConfig {
    fn default() -> Self {
        Self {
            strategy: GradingStrategy::default(),
            relevant_threshold: default_relevant_threshold(),
            ambiguous_threshold: default_ambiguous_threshold(),
            max_documents_to_grade: default_max_documents(),
            include_ambiguous: default_true(),
            grading_concurrency: default_concurrency(),
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            refuse_min_irrelevant: default_refuse_min_irrelevant(),
            refuse_irrelevant_ratio: default_refuse_irrelevant_ratio(),
            self_reflection_budget: default_self_reflection_budget(),
            evaluation_prompt: None,
            temperature: 0.0,
        }
    }
}

impl CragConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a threshold-based configuration
    pub fn threshold_based(relevant: f32, ambiguous: f32) -> Self {
        Self {
            strategy: GradingStrategy::Threshold,
            relevant_threshold: relevant,
            ambiguous_threshold: ambiguous,
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: GradingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_relevant_threshold(mut self, threshold: f32) -> Self {
        self.relevant_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_ambiguous_threshold(mut self, threshold: f32) -> Self {
        self.ambiguous_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_documents(mut self, max: usize) -> Self {
        self.max_documents_to_grade = max;
        self
    }

    pub fn with_include_ambiguous(mut self, include: bool) -> Self {
        self.include_ambiguous = include;
        self
    }

    pub fn with_grading_concurrency(mut self, concurrency: usize) -> Self {
        self.grading_concurrency = concurrency.max(1);
        self
    }

    pub fn with_watchdog_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.watchdog_timeout_ms = timeout_ms;
        self
    }

    pub fn with_refuse_policy(mut self, min_irrelevant: usize, irrelevant_ratio: f32) -> Self {
        self.refuse_min_irrelevant = min_irrelevant;
        self.refuse_irrelevant_ratio = irrelevant_ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the self-reflection budget; values above one are clamped
    pub fn with_self_reflection_budget(mut self, budget: u8) -> Self {
        self.self_reflection_budget = budget.min(1);
        self
    }

    pub fn with_evaluation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.evaluation_prompt = Some(prompt.into());
        self
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn self_reflection_enabled(&self) -> bool {
        self.self_reflection_budget > 0
    }

    /// Classify a score based on the configured thresholds
    pub fn classify(&self, score: f32) -> Grade {
        if score >= self.relevant_threshold {
            Grade::Relevant
        } else if score >= self.ambiguous_threshold {
            Grade::Ambiguous
        } else {
            Grade::Irrelevant
        }
    }

    /// Get the default evaluation prompt
    pub fn default_evaluation_prompt() -> &'static str {
        r#"You are grading whether a document helps answer a user question.

Question: ${query}

Document title: ${document_title}
Document:
${document_content}

Rate the relevance of this document to the question on a scale of 0 to 10, where:
- 0-3: Not relevant - the document does not help answer the question
- 4-6: Partially relevant - the document contains some related information
- 7-10: Highly relevant - the document directly answers the question

Respond with ONLY a JSON object in this exact format:
{"score": <number>, "reason": "<brief explanation>"}"#
    }

    /// Get the evaluation prompt to use
    pub fn evaluation_prompt(&self) -> &str {
        match &self.evaluation_prompt {
            Some(prompt) => prompt.as_str(),
            None => Self::default_evaluation_prompt(),
        }
    }
}
