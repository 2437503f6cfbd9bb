//! Fan-out retrieval across the strategies of a routing mode

use std::collections::HashMap;
use std::sync::Arc;

use futures::{stream, StreamExt};
use tracing::{debug, warn};

use crate::domain::pipeline::RoutingMode;
use crate::domain::retrieval::{
    RetrievalRouting, RetrievalStrategy, RetrievedDocument, StrategyConfig,
};

/// Route position, strategy name and its documents or error
type StrategyResult = (usize, String, Result<Vec<RetrievedDocument>, String>);

/// Documents plus which strategies were tried and which failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    pub documents: Vec<RetrievedDocument>,
    pub strategies_attempted: Vec<String>,
    pub strategies_failed: Vec<String>,
}

impl RetrievalOutcome {
    /// True when no strategy produced a result, including an empty route
    pub fn unavailable(&self) -> bool {
        self.strategies_failed.len() == self.strategies_attempted.len()
    }
}

/// Queries every strategy of a route concurrently and merges the results
#[derive(Debug, Clone)]
pub struct FanOutRetriever {
    strategies: HashMap<String, Arc<dyn RetrievalStrategy>>,
    routing: RetrievalRouting,
    concurrency: usize,
}

impl FanOutRetriever {
    pub fn new(routing: RetrievalRouting) -> Self {
        Self {
            strategies: HashMap::new(),
            routing,
            concurrency: 4,
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn RetrievalStrategy>) -> Self {
        self.strategies.insert(strategy.name().to_string(), strategy);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn routing(&self) -> &RetrievalRouting {
        &self.routing
    }

    /// Retrieve for a mode; the result is capped by `top_k` and the route maximum
    pub async fn retrieve(&self, query: &str, mode: RoutingMode, top_k: usize) -> RetrievalOutcome {
        let route = self.routing.route(mode);
        let strategies_attempted: Vec<String> =
            route.strategies.iter().map(|s| s.strategy.clone()).collect();

        let searches: Vec<_> = route
            .strategies
            .iter()
            .enumerate()
            .map(|(index, config)| self.search_strategy(index, query, config))
            .collect();
        let mut results: Vec<StrategyResult> = stream::iter(searches)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        // Merge in route order so equal-score duplicates resolve the same way every run
        results.sort_by_key(|(index, _, _)| *index);

        let mut merged: HashMap<String, RetrievedDocument> = HashMap::new();
        let mut strategies_failed = Vec::new();

        for (_, name, result) in results {
            match result {
                Ok(documents) => {
                    debug!(strategy = %name, count = documents.len(), "Strategy returned documents");
                    for doc in documents {
                        match merged.get(&doc.id) {
                            Some(existing) if existing.score >= doc.score => {}
                            _ => {
                                merged.insert(doc.id.clone(), doc);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(strategy = %name, error = %e, "Retrieval strategy failed");
                    strategies_failed.push(name);
                }
            }
        }

        strategies_failed.sort();

        let mut documents: Vec<RetrievedDocument> = merged.into_values().collect();
        documents.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        documents.truncate(top_k.min(route.max_documents));

        RetrievalOutcome {
            documents,
            strategies_attempted,
            strategies_failed,
        }
    }

    async fn search_strategy(
        &self,
        index: usize,
        query: &str,
        config: &StrategyConfig,
    ) -> StrategyResult {
        let result = match self.strategies.get(&config.strategy) {
            Some(strategy) => strategy
                .search(query, config)
                .await
                .map_err(|e| e.to_string()),
            None => Err(format!("Unknown retrieval strategy: {}", config.strategy)),
        };
        (index, config.strategy.clone(), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::retrieval::{MockRetrievalStrategy, RetrievalRoute};

    fn doc(id: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument::new(id, id, format!("Content for {}", id), score)
    }

    fn two_strategy_routing() -> RetrievalRouting {
        RetrievalRouting::default().with_route(
            RoutingMode::Auto,
            RetrievalRoute::new(
                vec![StrategyConfig::new("keyword"), StrategyConfig::new("vector")],
                10,
            ),
        )
    }

    #[tokio::test]
    async fn test_merges_dedups_and_sorts() {
        let retriever = FanOutRetriever::new(two_strategy_routing())
            .with_strategy(Arc::new(
                MockRetrievalStrategy::new("keyword").with_documents(vec![doc("a", 0.4), doc("b", 0.9)]),
            ))
            .with_strategy(Arc::new(
                MockRetrievalStrategy::new("vector").with_documents(vec![doc("a", 0.7), doc("c", 0.7)]),
            ));

        let outcome = retriever.retrieve("q", RoutingMode::Auto, 10).await;

        let ids: Vec<&str> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(outcome.documents[1].score, 0.7);
        assert_eq!(outcome.documents[1].strategy, "vector");
        assert!(outcome.strategies_failed.is_empty());
        assert!(!outcome.unavailable());
    }

    #[tokio::test]
    async fn test_caps_by_top_k() {
        let retriever = FanOutRetriever::new(two_strategy_routing())
            .with_strategy(Arc::new(
                MockRetrievalStrategy::new("keyword")
                    .with_documents(vec![doc("a", 0.4), doc("b", 0.9), doc("c", 0.5)]),
            ))
            .with_strategy(Arc::new(MockRetrievalStrategy::new("vector")));

        let outcome = retriever.retrieve("q", RoutingMode::Auto, 2).await;

        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.documents[0].id, "b");
    }

    #[tokio::test]
    async fn test_single_failure_is_recoverable() {
        let retriever = FanOutRetriever::new(two_strategy_routing())
            .with_strategy(Arc::new(
                MockRetrievalStrategy::new("keyword").with_documents(vec![doc("a", 0.8)]),
            ))
            .with_strategy(Arc::new(MockRetrievalStrategy::new("vector").with_error("index down")));

        let outcome = retriever.retrieve("q", RoutingMode::Auto, 10).await;

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.strategies_failed, vec!["vector".to_string()]);
        assert!(!outcome.unavailable());
    }

    #[tokio::test]
    async fn test_all_failed_or_unknown_is_unavailable() {
        let retriever = FanOutRetriever::new(two_strategy_routing()).with_strategy(Arc::new(
            MockRetrievalStrategy::new("keyword").with_error("timeout"),
        ));

        let outcome = retriever.retrieve("q", RoutingMode::Auto, 10).await;

        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.strategies_failed.len(), 2);
        assert!(outcome.unavailable());
    }

    #[tokio::test]
    async fn test_route_selected_by_mode() {
        let retriever = FanOutRetriever::new(RetrievalRouting::default()).with_strategy(Arc::new(
            MockRetrievalStrategy::new("keyword").with_documents(
                (0..10).map(|i| doc(&format!("d{}", i), 0.5)).collect(),
            ),
        ));

        let fast = retriever.retrieve("q", RoutingMode::Fast, 100).await;
        let auto = retriever.retrieve("q", RoutingMode::Auto, 100).await;

        assert_eq!(fast.documents.len(), 4);
        assert_eq!(auto.documents.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_score_duplicate_keeps_first_route_strategy() {
        // The first strategy of the route finishes last
        let retriever = FanOutRetriever::new(two_strategy_routing())
            .with_strategy(Arc::new(
                MockRetrievalStrategy::new("keyword")
                    .with_documents(vec![doc("a", 0.6)])
                    .with_delay(Duration::from_millis(50)),
            ))
            .with_strategy(Arc::new(
                MockRetrievalStrategy::new("vector").with_documents(vec![doc("a", 0.6)]),
            ));

        let outcome = retriever.retrieve("q", RoutingMode::Auto, 10).await;

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.documents[0].strategy, "keyword");
    }
}
