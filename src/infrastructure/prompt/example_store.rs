//! In-memory exemplar store keyed by intent

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::domain::prompt::{AnswerExemplar, ExampleProvider};
use crate::domain::query::QueryIntent;
use crate::domain::DomainError;
use crate::infrastructure::text;

/// Exemplars grouped by intent; within an intent the ones whose question
/// shares the most terms with the query come first
#[derive(Debug, Clone, Default)]
pub struct InMemoryExampleStore {
    by_intent: HashMap<QueryIntent, Vec<AnswerExemplar>>,
}

impl InMemoryExampleStore {
    pub fn new(exemplars: Vec<AnswerExemplar>) -> Self {
        let mut by_intent: HashMap<QueryIntent, Vec<AnswerExemplar>> = HashMap::new();
        for exemplar in exemplars {
            by_intent.entry(exemplar.intent).or_default().push(exemplar);
        }
        Self { by_intent }
    }

    /// Load a JSON array of exemplars
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::configuration(format!("Failed to read examples {}: {}", path.display(), e))
        })?;
        let exemplars: Vec<AnswerExemplar> = serde_json::from_str(&raw).map_err(|e| {
            DomainError::configuration(format!("Invalid examples {}: {}", path.display(), e))
        })?;

        Ok(Self::new(exemplars))
    }

    pub fn len(&self) -> usize {
        self.by_intent.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExampleProvider for InMemoryExampleStore {
    async fn examples(
        &self,
        intent: QueryIntent,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnswerExemplar>, DomainError> {
        let Some(candidates) = self.by_intent.get(&intent) else {
            return Ok(Vec::new());
        };

        let query_terms = text::term_set(query);
        let mut scored: Vec<(f32, &AnswerExemplar)> = candidates
            .iter()
            .map(|e| (text::coverage(&query_terms, &e.question), e))
            .collect();
        // stable, so equal scores keep file order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryExampleStore {
        InMemoryExampleStore::new(vec![
            AnswerExemplar::new(
                QueryIntent::Procedural,
                "How do I export a report?",
                "Open Reports, choose Export and pick a format [1].",
            ),
            AnswerExemplar::new(
                QueryIntent::Procedural,
                "How do I reset my VPN password?",
                "Use the self-service portal and follow the reset link [1].",
            ),
            AnswerExemplar::new(
                QueryIntent::Definition,
                "What is SSO?",
                "Single sign-on lets one login grant access to many apps [1].",
            ),
        ])
    }

    #[tokio::test]
    async fn test_examples_filtered_by_intent_and_ranked() {
        let examples = store()
            .examples(QueryIntent::Procedural, "reset vpn password", 1)
            .await
            .unwrap();

        assert_eq!(examples.len(), 1);
        assert!(examples[0].question.contains("VPN"));
    }

    #[tokio::test]
    async fn test_unknown_intent_has_no_examples() {
        let examples = store()
            .examples(QueryIntent::Comparison, "a or b", 3)
            .await
            .unwrap();

        assert!(examples.is_empty());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = InMemoryExampleStore::from_json_file("/nonexistent/examples.json");
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_len() {
        assert_eq!(store().len(), 3);
        assert!(InMemoryExampleStore::default().is_empty());
    }
}
