//! Retrieval strategy trait

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;

use super::document::RetrievedDocument;
use crate::domain::DomainError;

/// Parameters for one strategy within a route
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrategyConfig {
    /// Name of the registered strategy
    pub strategy: String,
    /// Number of results to request
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum retrieval score (0.0 - 1.0)
    #[serde(default)]
    pub min_score: f32,
}

fn default_top_k() -> usize {
    8
}

impl StrategyConfig {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            top_k: default_top_k(),
            min_score: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score.clamp(0.0, 1.0);
        self
    }
}

/// A retrieval backend (vector index, keyword index, web search)
#[async_trait]
pub trait RetrievalStrategy: Send + Sync + Debug {
    /// Search for documents matching the query
    async fn search(
        &self,
        query: &str,
        config: &StrategyConfig,
    ) -> Result<Vec<RetrievedDocument>, DomainError>;

    /// Name used in routes and as the document origin tag
    fn name(&self) -> &str;
}
