//! In-memory keyword strategy over a JSON corpus

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::retrieval::{DocumentType, RetrievalStrategy, RetrievedDocument, StrategyConfig};
use crate::domain::DomainError;
use crate::infrastructure::text;

/// A corpus entry as stored on disk
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CorpusDocument {
    pub id: String,
    pub title: String,
    #[serde(default, rename = "type")]
    pub doc_type: DocumentType,
    pub text: String,
}

impl CorpusDocument {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            doc_type: DocumentType::default(),
            text: text.into(),
        }
    }

    pub fn with_doc_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type = doc_type;
        self
    }
}

#[derive(Debug)]
struct IndexedDoc {
    document: CorpusDocument,
    title_terms: HashSet<String>,
    body_terms: HashSet<String>,
}

impl From<CorpusDocument> for IndexedDoc {
    fn from(document: CorpusDocument) -> Self {
        let title_terms = text::term_set(&document.title);
        let mut body_terms = text::term_set(&document.text);
        body_terms.extend(title_terms.iter().cloned());

        Self {
            document,
            title_terms,
            body_terms,
        }
    }
}

impl IndexedDoc {
    /// Term coverage of the whole document, with a bonus for title matches
    fn score(&self, query_terms: &HashSet<String>) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }

        let total = query_terms.len() as f32;
        let body = query_terms.iter().filter(|t| self.body_terms.contains(*t)).count() as f32;
        let title = query_terms.iter().filter(|t| self.title_terms.contains(*t)).count() as f32;

        (0.8 * body / total + 0.2 * title / total).clamp(0.0, 1.0)
    }
}

/// Keyword retrieval strategy for development and small corpora
#[derive(Debug)]
pub struct InMemoryKeywordStrategy {
    name: String,
    documents: Arc<RwLock<Vec<IndexedDoc>>>,
}

impl InMemoryKeywordStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_documents(name: impl Into<String>, documents: Vec<CorpusDocument>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(
                documents.into_iter().map(IndexedDoc::from).collect(),
            )),
        }
    }

    /// Load a JSON array of corpus documents
    pub fn from_json_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::configuration(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;
        let documents: Vec<CorpusDocument> = serde_json::from_str(&raw).map_err(|e| {
            DomainError::configuration(format!("Invalid corpus {}: {}", path.display(), e))
        })?;

        Ok(Self::with_documents(name, documents))
    }

    pub async fn add_documents(&self, documents: Vec<CorpusDocument>) {
        let mut docs = self.documents.write().await;
        docs.extend(documents.into_iter().map(IndexedDoc::from));
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl RetrievalStrategy for InMemoryKeywordStrategy {
    async fn search(
        &self,
        query: &str,
        config: &StrategyConfig,
    ) -> Result<Vec<RetrievedDocument>, DomainError> {
        let query_terms = text::term_set(query);
        let docs = self.documents.read().await;

        let mut results: Vec<RetrievedDocument> = docs
            .iter()
            .filter_map(|doc| {
                let score = doc.score(&query_terms);
                (score > 0.0 && score >= config.min_score).then(|| {
                    RetrievedDocument::new(
                        &doc.document.id,
                        &doc.document.title,
                        &doc.document.text,
                        score,
                    )
                    .with_doc_type(doc.document.doc_type)
                    .with_strategy(&self.name)
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(config.top_k);

        Ok(results)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<CorpusDocument> {
        vec![
            CorpusDocument::new(
                "vpn-reset",
                "Reset your VPN password",
                "Open the self-service portal and choose reset password for the VPN account.",
            )
            .with_doc_type(DocumentType::Faq),
            CorpusDocument::new(
                "vpn-install",
                "Install the VPN client",
                "Download the client from the software center.",
            ),
            CorpusDocument::new("holidays", "Holiday policy", "Employees receive 25 days."),
        ]
    }

    #[tokio::test]
    async fn test_search_ranks_by_term_coverage() {
        let strategy = InMemoryKeywordStrategy::with_documents("keyword", corpus());

        let results = strategy
            .search("reset VPN password", &StrategyConfig::new("keyword"))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "vpn-reset");
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[0].doc_type, DocumentType::Faq);
        assert_eq!(results[0].strategy, "keyword");
        assert!(results[1].score < results[0].score);
    }

    #[tokio::test]
    async fn test_search_respects_top_k_and_min_score() {
        let strategy = InMemoryKeywordStrategy::with_documents("keyword", corpus());

        let config = StrategyConfig::new("keyword").with_top_k(1);
        let results = strategy.search("vpn", &config).await.unwrap();
        assert_eq!(results.len(), 1);

        let config = StrategyConfig::new("keyword").with_min_score(0.9);
        let results = strategy.search("reset vpn client", &config).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_add_documents() {
        let strategy = InMemoryKeywordStrategy::new("keyword");
        strategy.add_documents(corpus()).await;

        assert_eq!(strategy.len().await, 3);
    }

    #[test]
    fn test_corpus_json_format() {
        let docs: Vec<CorpusDocument> = serde_json::from_str(
            r#"[{"id": "a", "title": "A", "type": "policy", "text": "Body"},
                {"id": "b", "title": "B", "text": "Body"}]"#,
        )
        .unwrap();

        assert_eq!(docs[0].doc_type, DocumentType::Policy);
        assert_eq!(docs[1].doc_type, DocumentType::Other);
    }

    #[test]
    fn test_missing_corpus_file_is_configuration_error() {
        let result = InMemoryKeywordStrategy::from_json_file("keyword", "/nonexistent/corpus.json");
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
