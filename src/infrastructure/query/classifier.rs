//! Rule-based query classifier

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::pipeline::RoutingMode;
use crate::domain::query::{Classification, QueryClassifier, QueryIntent};
use crate::domain::DomainError;
use crate::infrastructure::text;

static CONVERSATIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(hi|hello|hey|thanks|thank you|good (morning|afternoon|evening))\b")
        .expect("conversational pattern is a valid regex")
});

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(vs\.?|versus|compare[sd]?|comparison|difference between|better than|pros and cons)\b")
        .expect("comparison pattern is a valid regex")
});

static TROUBLESHOOTING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(error|errors|fail|fails|failed|failing|not working|doesn't work|broken|crash|crashes|crashed|issue|problem|can't|cannot|unable)\b")
        .expect("troubleshooting pattern is a valid regex")
});

static DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(what is|what's|what are|define|meaning of|definition of)\b")
        .expect("definition pattern is a valid regex")
});

static PROCEDURAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^\s*(how (do|can|should) (i|we|you)|steps to|guide to)\b)|\bhow to\b")
        .expect("procedural pattern is a valid regex")
});

static FACTUAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(who|when|where|which|how (many|much|long|often)|is|are|does|do|can)\b")
        .expect("factual pattern is a valid regex")
});

/// Queries longer than this are routed DEEP in AUTO mode
const LONG_QUERY_WORDS: usize = 24;
/// Queries of at most this many words are routed FAST in AUTO mode
const SHORT_QUERY_WORDS: usize = 6;

/// Regex intent detection plus word-count routing
#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn detect_intent(query: &str) -> QueryIntent {
        if CONVERSATIONAL.is_match(query) {
            QueryIntent::Conversational
        } else if COMPARISON.is_match(query) {
            QueryIntent::Comparison
        } else if TROUBLESHOOTING.is_match(query) {
            QueryIntent::Troubleshooting
        } else if DEFINITION.is_match(query) {
            QueryIntent::Definition
        } else if PROCEDURAL.is_match(query) {
            QueryIntent::Procedural
        } else if FACTUAL.is_match(query) {
            QueryIntent::Factual
        } else {
            QueryIntent::Unknown
        }
    }

    /// Resolve AUTO to a concrete mode; explicit modes are kept
    pub fn resolve_mode(requested: RoutingMode, intent: QueryIntent, query: &str) -> RoutingMode {
        if requested != RoutingMode::Auto {
            return requested;
        }

        let words = text::word_count(query);
        match intent {
            QueryIntent::Comparison | QueryIntent::Troubleshooting => RoutingMode::Deep,
            _ if words > LONG_QUERY_WORDS => RoutingMode::Deep,
            QueryIntent::Definition => RoutingMode::Fast,
            _ if words <= SHORT_QUERY_WORDS => RoutingMode::Fast,
            _ => RoutingMode::Auto,
        }
    }
}

#[async_trait]
impl QueryClassifier for RuleBasedClassifier {
    async fn classify(
        &self,
        query: &str,
        requested: RoutingMode,
    ) -> Result<Classification, DomainError> {
        let intent = Self::detect_intent(query);
        let mode = Self::resolve_mode(requested, intent, query);

        debug!(intent = %intent, mode = %mode, "Query classified");
        Ok(Classification::new(mode, intent))
    }
}
