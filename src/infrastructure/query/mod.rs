//! Query understanding implementations

mod classifier;
mod decontextualizer;
mod refiner;

pub use classifier::RuleBasedClassifier;
pub use decontextualizer::{HeuristicDecontextualizer, LlmDecontextualizer};
pub use refiner::{KeywordQueryRefiner, LlmQueryRefiner};

/// First non-empty line of an LLM rewrite, without surrounding quotes
pub(crate) fn clean_rewrite(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let cleaned = line.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();

    (!cleaned.is_empty()).then(|| cleaned.to_string())
}
