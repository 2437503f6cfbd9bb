//! Retrieval domain
//!
//! Documents, the strategy trait implemented by retrieval backends, and the
//! per-mode routing table used by the fan-out retriever.

mod document;
mod routing;
mod strategy;

pub use document::{DocumentType, RetrievedDocument};
pub use routing::{KEYWORD_STRATEGY, RetrievalRoute, RetrievalRouting};
pub use strategy::{RetrievalStrategy, StrategyConfig};

#[cfg(test)]
pub use strategy::mock::MockRetrievalStrategy;
