//! Query understanding collaborators

use std::fmt::Debug;

use async_trait::async_trait;

use super::intent::Classification;
use crate::domain::crag::GradedDocument;
use crate::domain::pipeline::{ConversationTurn, RoutingMode};
use crate::domain::DomainError;

/// Resolves the routing mode and intent of a query
#[async_trait]
pub trait QueryClassifier: Send + Sync + Debug {
    async fn classify(
        &self,
        query: &str,
        requested: RoutingMode,
    ) -> Result<Classification, DomainError>;
}

/// Rewrites a follow-up question into a standalone query
#[async_trait]
pub trait Decontextualizer: Send + Sync + Debug {
    async fn decontextualize(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<String, DomainError>;
}

/// Produces a refined query for self-reflection after a failed grading round
#[async_trait]
pub trait QueryRefiner: Send + Sync + Debug {
    async fn refine(&self, query: &str, graded: &[GradedDocument]) -> Result<String, DomainError>;
}
