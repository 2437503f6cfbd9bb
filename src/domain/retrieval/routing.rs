//! Per-mode retrieval routing (EPR routing)

use std::collections::HashMap;

use serde::Deserialize;

use super::strategy::StrategyConfig;
use crate::domain::pipeline::RoutingMode;

/// Name of the built-in keyword strategy
pub const KEYWORD_STRATEGY: &str = "keyword";

/// Strategies queried for one routing mode
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetrievalRoute {
    pub strategies: Vec<StrategyConfig>,
    /// Cap on the merged result list
    pub max_documents: usize,
}

impl RetrievalRoute {
    pub fn new(strategies: Vec<StrategyConfig>, max_documents: usize) -> Self {
        Self {
            strategies,
            max_documents,
        }
    }
}

/// Routing table from mode to route
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRouting {
    routes: HashMap<RoutingMode, RetrievalRoute>,
}

impl RetrievalRouting {
    /// Build a routing table; modes missing from `routes` use the default route
    pub fn from_routes(routes: HashMap<RoutingMode, RetrievalRoute>) -> Self {
        let mut routing = Self::default();
        routing.routes.extend(routes);
        routing
    }

    pub fn with_route(mut self, mode: RoutingMode, route: RetrievalRoute) -> Self {
        self.routes.insert(mode, route);
        self
    }

    pub fn route(&self, mode: RoutingMode) -> &RetrievalRoute {
        self.routes
            .get(&mode)
            .or_else(|| self.routes.get(&RoutingMode::Auto))
            .unwrap_or(&DEFAULT_AUTO_ROUTE)
    }
}

static DEFAULT_AUTO_ROUTE: once_cell::sync::Lazy<RetrievalRoute> =
    once_cell::sync::Lazy::new(|| default_route(RoutingMode::Auto));

fn default_route(mode: RoutingMode) -> RetrievalRoute {
    match mode {
        RoutingMode::Fast => RetrievalRoute::new(
            vec![StrategyConfig::new(KEYWORD_STRATEGY).with_top_k(4).with_min_score(0.2)],
            4,
        ),
        RoutingMode::Auto => RetrievalRoute::new(
            vec![StrategyConfig::new(KEYWORD_STRATEGY).with_top_k(8).with_min_score(0.1)],
            8,
        ),
        RoutingMode::Deep => RetrievalRoute::new(
            vec![StrategyConfig::new(KEYWORD_STRATEGY).with_top_k(16)],
            12,
        ),
    }
}

impl Default for RetrievalRouting {
    fn default() -> Self {
        let routes = RoutingMode::all()
            .into_iter()
            .map(|mode| (mode, default_route(mode)))
            .collect();

        Self { routes }
    }
}
